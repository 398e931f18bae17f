//! `SeaORM` active enums mapped to Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Direction of a money movement (`entry_kind` Postgres enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "entry_kind")]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Money in.
    #[sea_orm(string_value = "deposit")]
    Deposit,
    /// Money out.
    #[sea_orm(string_value = "withdrawal")]
    Withdrawal,
}

/// Lifecycle status of a ledger entry (`entry_status` Postgres enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "entry_status")]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Created locally, not yet accepted by the provider.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Accepted by the provider, awaiting confirmation.
    #[sea_orm(string_value = "processing")]
    Processing,
    /// Confirmed successful.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Declined, timed out, or abandoned.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// Cancelled by the user or the retention sweep.
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}
