//! Wallets migration.
//!
//! Creates the wallets table. The balance CHECK backs up the application
//! invariant that a wallet can never go negative.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(WALLETS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TABLE IF EXISTS wallets CASCADE;")
            .await?;
        Ok(())
    }
}

const WALLETS_SQL: &str = r"
-- Wallets: one balance per user, mutated only by ledger-entry transitions
CREATE TABLE wallets (
    id UUID PRIMARY KEY,
    user_id UUID NOT NULL UNIQUE,
    balance NUMERIC(20, 0) NOT NULL DEFAULT 0,
    currency VARCHAR(3) NOT NULL DEFAULT 'UGX',
    destination_msisdn VARCHAR(15),
    contact_email VARCHAR(255),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_balance_non_negative CHECK (balance >= 0)
);
";
