//! Ledger entries migration.
//!
//! Creates the ledger_entries table. The unique partial index on
//! provider_request_id makes the provider reference usable as an
//! idempotency key for confirmations.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(LEDGER_ENTRIES_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            "DROP TABLE IF EXISTS ledger_entries CASCADE;
             DROP TYPE IF EXISTS entry_status;
             DROP TYPE IF EXISTS entry_kind;",
        )
        .await?;
        Ok(())
    }
}

const LEDGER_ENTRIES_SQL: &str = r"
CREATE TYPE entry_kind AS ENUM ('deposit', 'withdrawal');
CREATE TYPE entry_status AS ENUM ('pending', 'processing', 'completed', 'failed', 'cancelled');

-- Ledger entries: one attempted money movement each, never deleted
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    wallet_id UUID NOT NULL REFERENCES wallets(id) ON DELETE RESTRICT,
    kind entry_kind NOT NULL,
    amount NUMERIC(20, 0) NOT NULL,
    status entry_status NOT NULL DEFAULT 'pending',
    provider_request_id VARCHAR(64),
    provider_confirmation_id VARCHAR(64),
    destination VARCHAR(15) NOT NULL,
    description TEXT,
    failure_reason TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    max_retries INTEGER NOT NULL DEFAULT 5,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    completed_at TIMESTAMPTZ,
    failed_at TIMESTAMPTZ,
    cancelled_at TIMESTAMPTZ,
    CONSTRAINT chk_amount_positive CHECK (amount > 0)
);

-- Idempotency key for incoming confirmations
CREATE UNIQUE INDEX idx_entries_provider_ref ON ledger_entries(provider_request_id)
    WHERE provider_request_id IS NOT NULL;

-- Wallet history (most common read)
CREATE INDEX idx_entries_wallet ON ledger_entries(wallet_id, created_at DESC);

-- Sweeper selection of stale open entries
CREATE INDEX idx_entries_open ON ledger_entries(created_at)
    WHERE status IN ('pending', 'processing');

-- Retention sweep over old failures
CREATE INDEX idx_entries_failed ON ledger_entries(failed_at)
    WHERE status = 'failed';
";
