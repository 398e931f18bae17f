//! Ledger entry domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kavera_shared::types::{Currency, LedgerEntryId, WalletId};

/// Direction of a money movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Money moving from the user's mobile-money account into the wallet.
    Deposit,
    /// Money moving from the wallet out to the user's mobile-money account.
    Withdrawal,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Deposit => write!(f, "deposit"),
            Self::Withdrawal => write!(f, "withdrawal"),
        }
    }
}

/// Lifecycle status of a ledger entry.
///
/// Entries move only forward: `pending` is never re-entered, and nothing
/// leaves `completed` or `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// Created locally, not yet accepted by the provider.
    Pending,
    /// Accepted by the provider, awaiting confirmation.
    Processing,
    /// Confirmed successful; the balance adjustment has been applied.
    Completed,
    /// Declined, timed out, or abandoned; any reservation was refunded.
    Failed,
    /// Cancelled by the user or rewritten by the retention sweep.
    Cancelled,
}

impl EntryStatus {
    /// Returns true if no further transition can leave this status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns true if the entry is still awaiting settlement.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Returns true if a user may still cancel the entry.
    #[must_use]
    pub fn is_cancellable(&self) -> bool {
        self.is_open()
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One attempted money movement.
///
/// The persisted record is the single source of truth; every mutation goes
/// through [`apply_transition`](super::transition::apply_transition) and is
/// persisted with a compare-and-set on the status it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique identifier, assigned at creation.
    pub id: LedgerEntryId,
    /// The wallet this entry moves money for.
    pub wallet_id: WalletId,
    /// Deposit or withdrawal.
    pub kind: EntryKind,
    /// Amount in the smallest currency unit. Always positive.
    pub amount: Decimal,
    /// Current lifecycle status.
    pub status: EntryStatus,
    /// Provider-assigned request id, set when the provider accepts the
    /// request. Idempotency key for incoming confirmations.
    pub provider_request_id: Option<String>,
    /// Provider-assigned confirmation id, set on success.
    pub provider_confirmation_id: Option<String>,
    /// MSISDN the money moves to or from.
    pub destination: String,
    /// Caller-supplied description.
    pub description: Option<String>,
    /// Reason the entry failed, set only on transition into `failed`.
    pub failure_reason: Option<String>,
    /// Ambiguous reconciliation attempts so far.
    pub retry_count: u32,
    /// Bound on ambiguous reconciliation attempts.
    pub max_retries: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Set by the transition into `completed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Set by the transition into `failed`.
    pub failed_at: Option<DateTime<Utc>>,
    /// Set by the transition into `cancelled`.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Creates a new entry in `pending` state.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        wallet_id: WalletId,
        kind: EntryKind,
        amount: Decimal,
        destination: String,
        description: Option<String>,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LedgerEntryId::new(),
            wallet_id,
            kind,
            amount,
            status: EntryStatus::Pending,
            provider_request_id: None,
            provider_confirmation_id: None,
            destination,
            description,
            failure_reason: None,
            retry_count: 0,
            max_retries,
            created_at: now,
            updated_at: now,
            completed_at: None,
            failed_at: None,
            cancelled_at: None,
        }
    }

    /// Returns true if no further transition can leave the current status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Age of the entry at `now`.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}

/// A user's wallet as the settlement core sees it.
///
/// The balance is mutated only inside the storage transaction that
/// finalizes a ledger-entry transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique identifier.
    pub id: WalletId,
    /// Owning user (issued by the identity provider).
    pub user_id: Uuid,
    /// Current balance in the smallest currency unit. Never negative.
    pub balance: Decimal,
    /// Currency the balance is denominated in.
    pub currency: Currency,
    /// Payout destination on file, if any.
    pub destination_msisdn: Option<String>,
    /// Email for payment outcome notices, if the user registered one.
    pub contact_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_status_terminal() {
        assert!(!EntryStatus::Pending.is_terminal());
        assert!(!EntryStatus::Processing.is_terminal());
        assert!(!EntryStatus::Failed.is_terminal());
        assert!(EntryStatus::Completed.is_terminal());
        assert!(EntryStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_status_open() {
        assert!(EntryStatus::Pending.is_open());
        assert!(EntryStatus::Processing.is_open());
        assert!(!EntryStatus::Completed.is_open());
        assert!(!EntryStatus::Failed.is_open());
        assert!(!EntryStatus::Cancelled.is_open());
    }

    #[test]
    fn test_cancellable_matches_open() {
        for status in [
            EntryStatus::Pending,
            EntryStatus::Processing,
            EntryStatus::Completed,
            EntryStatus::Failed,
            EntryStatus::Cancelled,
        ] {
            assert_eq!(status.is_cancellable(), status.is_open());
        }
    }

    #[test]
    fn test_new_entry_is_pending() {
        let now = Utc::now();
        let entry = LedgerEntry::new(
            WalletId::new(),
            EntryKind::Deposit,
            dec!(5000),
            "256700000001".to_string(),
            None,
            5,
            now,
        );
        assert_eq!(entry.status, EntryStatus::Pending);
        assert_eq!(entry.retry_count, 0);
        assert!(entry.provider_request_id.is_none());
        assert_eq!(entry.created_at, now);
    }
}
