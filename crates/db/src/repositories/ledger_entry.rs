//! Ledger entry repository.
//!
//! Implements the settlement core's [`LedgerStore`] contract. Every status
//! write is a compare-and-set on the status the transition was computed
//! from (`UPDATE ... WHERE id = ? AND status = ?`), and the paired wallet
//! balance write executes in the same database transaction. Losing a race
//! writes nothing and surfaces as [`ApplyResult::StaleStatus`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use kavera_core::ledger::{
    ApplyResult, EntryKind, EntryStatus, LedgerEntry, LedgerStore, StoreError,
    TransitionOutcome, Wallet,
};
use kavera_shared::types::{Currency, LedgerEntryId, WalletId};

use crate::entities::{ledger_entries, sea_orm_active_enums, wallets};

/// Ledger entry repository backing the settlement core.
#[derive(Debug, Clone)]
pub struct LedgerEntryRepository {
    db: DatabaseConnection,
}

impl LedgerEntryRepository {
    /// Creates a new ledger entry repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Inserts an entry row inside `txn`.
    async fn insert_entry(
        txn: &DatabaseTransaction,
        entry: &LedgerEntry,
    ) -> Result<(), StoreError> {
        let row = ledger_entries::ActiveModel {
            id: Set(entry.id.into_inner()),
            wallet_id: Set(entry.wallet_id.into_inner()),
            kind: Set(kind_to_db(entry.kind)),
            amount: Set(entry.amount),
            status: Set(status_to_db(entry.status)),
            provider_request_id: Set(entry.provider_request_id.clone()),
            provider_confirmation_id: Set(entry.provider_confirmation_id.clone()),
            destination: Set(entry.destination.clone()),
            description: Set(entry.description.clone()),
            failure_reason: Set(entry.failure_reason.clone()),
            retry_count: Set(int_from_u32(entry.retry_count)),
            max_retries: Set(int_from_u32(entry.max_retries)),
            created_at: Set(entry.created_at.into()),
            updated_at: Set(entry.updated_at.into()),
            completed_at: Set(entry.completed_at.map(Into::into)),
            failed_at: Set(entry.failed_at.map(Into::into)),
            cancelled_at: Set(entry.cancelled_at.map(Into::into)),
        };

        row.insert(txn).await.map_err(store_err)?;
        Ok(())
    }

    /// Applies a balance delta to a wallet inside `txn`.
    async fn adjust_balance(
        txn: &DatabaseTransaction,
        wallet_id: WalletId,
        delta: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = wallets::Entity::update_many()
            .col_expr(
                wallets::Column::Balance,
                Expr::col(wallets::Column::Balance).add(delta),
            )
            .col_expr(wallets::Column::UpdatedAt, Expr::value(now))
            .filter(wallets::Column::Id.eq(wallet_id.into_inner()))
            .exec(txn)
            .await
            .map_err(store_err)?;

        if result.rows_affected == 1 {
            Ok(())
        } else {
            Err(StoreError::WalletNotFound)
        }
    }
}

#[async_trait]
impl LedgerStore for LedgerEntryRepository {
    async fn create_deposit(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;
        Self::insert_entry(&txn, entry).await?;
        txn.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn create_withdrawal_reserved(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let txn = self.db.begin().await.map_err(store_err)?;

        // Conditional debit: only succeeds while the balance covers the
        // amount. The CHECK constraint is the second line of defense.
        let debited = wallets::Entity::update_many()
            .col_expr(
                wallets::Column::Balance,
                Expr::col(wallets::Column::Balance).sub(entry.amount),
            )
            .col_expr(wallets::Column::UpdatedAt, Expr::value(entry.created_at))
            .filter(wallets::Column::Id.eq(entry.wallet_id.into_inner()))
            .filter(wallets::Column::Balance.gte(entry.amount))
            .exec(&txn)
            .await
            .map_err(store_err)?;

        if debited.rows_affected == 0 {
            txn.rollback().await.map_err(store_err)?;

            let exists = wallets::Entity::find_by_id(entry.wallet_id.into_inner())
                .one(&self.db)
                .await
                .map_err(store_err)?
                .is_some();
            return Err(if exists {
                StoreError::InsufficientBalance
            } else {
                StoreError::WalletNotFound
            });
        }

        Self::insert_entry(&txn, entry).await?;
        txn.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn find_entry(&self, id: LedgerEntryId) -> Result<Option<LedgerEntry>, StoreError> {
        let model = ledger_entries::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn find_by_provider_reference(
        &self,
        provider_request_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let model = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::ProviderRequestId.eq(provider_request_id))
            .one(&self.db)
            .await
            .map_err(store_err)?;
        Ok(model.map(model_to_domain))
    }

    async fn apply_outcome(
        &self,
        expected: EntryStatus,
        outcome: &TransitionOutcome,
    ) -> Result<ApplyResult, StoreError> {
        let entry = &outcome.entry;
        let txn = self.db.begin().await.map_err(store_err)?;

        let update = ledger_entries::ActiveModel {
            status: Set(status_to_db(entry.status)),
            provider_request_id: Set(entry.provider_request_id.clone()),
            provider_confirmation_id: Set(entry.provider_confirmation_id.clone()),
            failure_reason: Set(entry.failure_reason.clone()),
            retry_count: Set(int_from_u32(entry.retry_count)),
            updated_at: Set(entry.updated_at.into()),
            completed_at: Set(entry.completed_at.map(Into::into)),
            failed_at: Set(entry.failed_at.map(Into::into)),
            cancelled_at: Set(entry.cancelled_at.map(Into::into)),
            ..Default::default()
        };

        let result = ledger_entries::Entity::update_many()
            .set(update)
            .filter(ledger_entries::Column::Id.eq(entry.id.into_inner()))
            .filter(ledger_entries::Column::Status.eq(status_to_db(expected)))
            .exec(&txn)
            .await
            .map_err(store_err)?;

        if result.rows_affected == 0 {
            // Another path finalized the entry first.
            txn.rollback().await.map_err(store_err)?;
            debug!(entry_id = %entry.id, expected = %expected, "transition lost the race");
            return Ok(ApplyResult::StaleStatus);
        }

        let delta = outcome.effect.delta();
        if !delta.is_zero() {
            Self::adjust_balance(&txn, entry.wallet_id, delta, entry.updated_at).await?;
        }

        txn.commit().await.map_err(store_err)?;
        Ok(ApplyResult::Applied)
    }

    async fn count_open_entries(&self, wallet_id: WalletId) -> Result<u64, StoreError> {
        ledger_entries::Entity::find()
            .filter(ledger_entries::Column::WalletId.eq(wallet_id.into_inner()))
            .filter(ledger_entries::Column::Status.is_in(open_statuses()))
            .count(&self.db)
            .await
            .map_err(store_err)
    }

    async fn list_stale_open(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let models = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::Status.is_in(open_statuses()))
            .filter(ledger_entries::Column::CreatedAt.lt(cutoff))
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn list_failed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let models = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::Status.eq(sea_orm_active_enums::EntryStatus::Failed))
            .filter(ledger_entries::Column::FailedAt.lt(cutoff))
            .order_by_asc(ledger_entries::Column::FailedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?;
        Ok(models.into_iter().map(model_to_domain).collect())
    }

    async fn list_entries(
        &self,
        wallet_id: WalletId,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<LedgerEntry>, u64), StoreError> {
        let query = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::WalletId.eq(wallet_id.into_inner()));

        let total = query.clone().count(&self.db).await.map_err(store_err)?;

        let models = query
            .order_by_desc(ledger_entries::Column::CreatedAt)
            .offset(offset)
            .limit(limit)
            .all(&self.db)
            .await
            .map_err(store_err)?;

        Ok((models.into_iter().map(model_to_domain).collect(), total))
    }

    async fn find_wallet_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        let model = wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
            .map_err(store_err)?;
        model.map(wallet_to_domain).transpose()
    }

    async fn find_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, StoreError> {
        let model = wallets::Entity::find_by_id(wallet_id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?;
        model.map(wallet_to_domain).transpose()
    }
}

fn wallet_to_domain(model: wallets::Model) -> Result<Wallet, StoreError> {
    let currency = model
        .currency
        .parse::<Currency>()
        .map_err(|e| StoreError::Database(format!("wallet {}: {e}", model.id)))?;
    Ok(Wallet {
        id: WalletId::from_uuid(model.id),
        user_id: model.user_id,
        balance: model.balance,
        currency,
        destination_msisdn: model.destination_msisdn,
        contact_email: model.contact_email,
    })
}

// ============================================================================
// Conversions
// ============================================================================

fn open_statuses() -> [sea_orm_active_enums::EntryStatus; 2] {
    [
        sea_orm_active_enums::EntryStatus::Pending,
        sea_orm_active_enums::EntryStatus::Processing,
    ]
}

const fn kind_to_db(kind: EntryKind) -> sea_orm_active_enums::EntryKind {
    match kind {
        EntryKind::Deposit => sea_orm_active_enums::EntryKind::Deposit,
        EntryKind::Withdrawal => sea_orm_active_enums::EntryKind::Withdrawal,
    }
}

const fn kind_from_db(kind: sea_orm_active_enums::EntryKind) -> EntryKind {
    match kind {
        sea_orm_active_enums::EntryKind::Deposit => EntryKind::Deposit,
        sea_orm_active_enums::EntryKind::Withdrawal => EntryKind::Withdrawal,
    }
}

const fn status_to_db(status: EntryStatus) -> sea_orm_active_enums::EntryStatus {
    match status {
        EntryStatus::Pending => sea_orm_active_enums::EntryStatus::Pending,
        EntryStatus::Processing => sea_orm_active_enums::EntryStatus::Processing,
        EntryStatus::Completed => sea_orm_active_enums::EntryStatus::Completed,
        EntryStatus::Failed => sea_orm_active_enums::EntryStatus::Failed,
        EntryStatus::Cancelled => sea_orm_active_enums::EntryStatus::Cancelled,
    }
}

const fn status_from_db(status: sea_orm_active_enums::EntryStatus) -> EntryStatus {
    match status {
        sea_orm_active_enums::EntryStatus::Pending => EntryStatus::Pending,
        sea_orm_active_enums::EntryStatus::Processing => EntryStatus::Processing,
        sea_orm_active_enums::EntryStatus::Completed => EntryStatus::Completed,
        sea_orm_active_enums::EntryStatus::Failed => EntryStatus::Failed,
        sea_orm_active_enums::EntryStatus::Cancelled => EntryStatus::Cancelled,
    }
}

fn int_from_u32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn u32_from_int(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn model_to_domain(model: ledger_entries::Model) -> LedgerEntry {
    LedgerEntry {
        id: LedgerEntryId::from_uuid(model.id),
        wallet_id: WalletId::from_uuid(model.wallet_id),
        kind: kind_from_db(model.kind),
        amount: model.amount,
        status: status_from_db(model.status),
        provider_request_id: model.provider_request_id,
        provider_confirmation_id: model.provider_confirmation_id,
        destination: model.destination,
        description: model.description,
        failure_reason: model.failure_reason,
        retry_count: u32_from_int(model.retry_count),
        max_retries: u32_from_int(model.max_retries),
        created_at: model.created_at.to_utc(),
        updated_at: model.updated_at.to_utc(),
        completed_at: model.completed_at.map(|t| t.to_utc()),
        failed_at: model.failed_at.map(|t| t.to_utc()),
        cancelled_at: model.cancelled_at.map(|t| t.to_utc()),
    }
}

fn store_err(error: DbErr) -> StoreError {
    // The only unique constraint the ledger store can trip is the partial
    // index on provider_request_id.
    if let Some(sea_orm::SqlErr::UniqueConstraintViolation(message)) = error.sql_err() {
        return StoreError::DuplicateProviderReference(message);
    }
    StoreError::Database(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_conversion_roundtrip() {
        for status in [
            EntryStatus::Pending,
            EntryStatus::Processing,
            EntryStatus::Completed,
            EntryStatus::Failed,
            EntryStatus::Cancelled,
        ] {
            assert_eq!(status_from_db(status_to_db(status)), status);
        }
    }

    #[test]
    fn test_kind_conversion_roundtrip() {
        for kind in [EntryKind::Deposit, EntryKind::Withdrawal] {
            assert_eq!(kind_from_db(kind_to_db(kind)), kind);
        }
    }

    #[test]
    fn test_retry_count_conversion_saturates() {
        assert_eq!(int_from_u32(3), 3);
        assert_eq!(int_from_u32(u32::MAX), i32::MAX);
        assert_eq!(u32_from_int(-1), 0);
    }
}
