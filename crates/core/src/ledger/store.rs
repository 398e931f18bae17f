//! Storage contract for the settlement core.
//!
//! The persisted record is the single source of truth. All status writes go
//! through [`LedgerStore::apply_outcome`], a compare-and-set on the status
//! the transition was computed from, with the paired wallet write in the
//! same storage transaction. The webhook handler and the sweeper converge
//! on identical state because both run against this one contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use kavera_shared::types::{LedgerEntryId, WalletId};

use super::entry::{EntryStatus, LedgerEntry, Wallet};
use super::transition::TransitionOutcome;

/// Result of a conditional transition write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    /// The compare-and-set matched; status and balance are persisted.
    Applied,
    /// Another path finalized the entry first; nothing was written.
    StaleStatus,
}

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The wallet balance cannot cover a reservation.
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Wallet not found.
    #[error("wallet not found")]
    WalletNotFound,

    /// A provider request id was already recorded for another entry.
    #[error("duplicate provider reference: {0}")]
    DuplicateProviderReference(String),

    /// Underlying database error.
    #[error("database error: {0}")]
    Database(String),
}

/// Storage operations the settlement core depends on.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists a new deposit entry. No balance effect.
    async fn create_deposit(&self, entry: &LedgerEntry) -> Result<(), StoreError>;

    /// Persists a new withdrawal entry and reserves (debits) its amount
    /// from the wallet, both in one storage transaction. Fails with
    /// [`StoreError::InsufficientBalance`] without persisting anything
    /// when the balance cannot cover the amount.
    async fn create_withdrawal_reserved(&self, entry: &LedgerEntry) -> Result<(), StoreError>;

    /// Loads an entry by id.
    async fn find_entry(&self, id: LedgerEntryId) -> Result<Option<LedgerEntry>, StoreError>;

    /// Loads an entry by its provider request id.
    async fn find_by_provider_reference(
        &self,
        provider_request_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError>;

    /// Persists a transition outcome conditionally: the status row update
    /// only applies while the entry still has status `expected`, and the
    /// outcome's balance effect executes in the same transaction. Returns
    /// [`ApplyResult::StaleStatus`] (with nothing written) when a
    /// concurrent path won the race.
    async fn apply_outcome(
        &self,
        expected: EntryStatus,
        outcome: &TransitionOutcome,
    ) -> Result<ApplyResult, StoreError>;

    /// Counts open (pending/processing) entries for a wallet.
    async fn count_open_entries(&self, wallet_id: WalletId) -> Result<u64, StoreError>;

    /// Lists open entries created before `cutoff`, oldest first.
    async fn list_stale_open(&self, cutoff: DateTime<Utc>) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Lists failed entries whose failure is older than `cutoff`.
    async fn list_failed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, StoreError>;

    /// Lists a wallet's entries, newest first, with a total count.
    async fn list_entries(
        &self,
        wallet_id: WalletId,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<LedgerEntry>, u64), StoreError>;

    /// Loads a user's wallet.
    async fn find_wallet_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, StoreError>;

    /// Loads a wallet by id.
    async fn find_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, StoreError>;
}
