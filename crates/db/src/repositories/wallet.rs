//! Wallet repository for database operations.
//!
//! Balance mutations do not live here: they happen only inside the
//! transition writes in [`LedgerEntryRepository`](super::LedgerEntryRepository),
//! so every balance change is attributable to exactly one ledger entry.

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::entities::wallets;

/// Wallet repository for lookups and provisioning.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    db: DatabaseConnection,
}

impl WalletRepository {
    /// Creates a new wallet repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a wallet for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(
        &self,
        user_id: Uuid,
        currency: &str,
        destination_msisdn: Option<&str>,
        contact_email: Option<&str>,
        opening_balance: Decimal,
    ) -> Result<wallets::Model, DbErr> {
        let now = Utc::now().into();

        let wallet = wallets::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(user_id),
            balance: Set(opening_balance),
            currency: Set(currency.to_string()),
            destination_msisdn: Set(destination_msisdn.map(String::from)),
            contact_email: Set(contact_email.map(String::from)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        wallet.insert(&self.db).await
    }

    /// Finds a wallet by its owning user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_user(&self, user_id: Uuid) -> Result<Option<wallets::Model>, DbErr> {
        wallets::Entity::find()
            .filter(wallets::Column::UserId.eq(user_id))
            .one(&self.db)
            .await
    }

    /// Finds a wallet by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<wallets::Model>, DbErr> {
        wallets::Entity::find_by_id(id).one(&self.db).await
    }
}
