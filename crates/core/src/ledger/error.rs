//! Settlement error types.
//!
//! This module defines all errors that can occur during settlement
//! operations: request validation, gateway interaction, confirmation
//! handling, and concurrency outcomes.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during settlement operations.
#[derive(Debug, Error)]
pub enum SettlementError {
    // ========== Validation Errors ==========
    /// Amount must be a positive whole number of minor units.
    #[error("Amount must be a positive whole number of minor units")]
    InvalidAmount,

    /// Amount is outside the provider-accepted bounds.
    #[error("Amount {amount} is outside the accepted range {min}..={max}")]
    AmountOutOfBounds {
        /// The requested amount.
        amount: Decimal,
        /// Smallest accepted amount.
        min: Decimal,
        /// Largest accepted amount.
        max: Decimal,
    },

    /// Destination MSISDN is malformed.
    #[error("Destination is not a valid MSISDN: {0}")]
    InvalidDestination(String),

    /// The wallet has no payout destination on file.
    #[error("No payout destination on file")]
    NoDestinationOnFile,

    /// The wallet balance cannot cover the withdrawal.
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        /// Amount requested.
        requested: Decimal,
        /// Balance available.
        available: Decimal,
    },

    /// The user already has too many unsettled entries.
    #[error("Too many pending entries: {open} open, limit {limit}")]
    TooManyPending {
        /// Open entries for this user.
        open: u64,
        /// Configured limit.
        limit: u64,
    },

    /// The withdrawal exceeds the per-request user limit.
    #[error("Withdrawal {requested} exceeds the per-request limit {limit}")]
    OverUserLimit {
        /// Amount requested.
        requested: Decimal,
        /// Configured limit.
        limit: Decimal,
    },

    // ========== Gateway Errors ==========
    /// The provider declined the request synchronously.
    #[error("Gateway rejected the request: {0}")]
    GatewayRejected(String),

    /// The provider could not be reached; the outcome is ambiguous and is
    /// resolved asynchronously, never surfaced as a user-facing failure.
    #[error("Gateway unreachable: {0}")]
    GatewayUnreachable(String),

    // ========== Confirmation Errors ==========
    /// A confirmation referenced a provider request id no entry carries.
    #[error("No entry found for provider reference {0}")]
    UnknownReference(String),

    /// The entry was already finalized by a concurrent path. Treated as a
    /// success-no-op toward the provider.
    #[error("Entry already finalized")]
    AlreadyTerminal,

    // ========== Lookup / State Errors ==========
    /// Entry not found.
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(Uuid),

    /// Wallet not found.
    #[error("Wallet not found for user {0}")]
    WalletNotFound(Uuid),

    /// The entry is already terminal and cannot be cancelled.
    #[error("Entry is not cancellable")]
    NotCancellable,

    // ========== Infrastructure ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::AmountOutOfBounds { .. } => "AMOUNT_OUT_OF_BOUNDS",
            Self::InvalidDestination(_) => "INVALID_DESTINATION",
            Self::NoDestinationOnFile => "NO_DESTINATION_ON_FILE",
            Self::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            Self::TooManyPending { .. } => "TOO_MANY_PENDING",
            Self::OverUserLimit { .. } => "OVER_USER_LIMIT",
            Self::GatewayRejected(_) => "GATEWAY_REJECTED",
            Self::GatewayUnreachable(_) => "GATEWAY_UNREACHABLE",
            Self::UnknownReference(_) => "UNKNOWN_REFERENCE",
            Self::AlreadyTerminal => "ALREADY_TERMINAL",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::WalletNotFound(_) => "WALLET_NOT_FOUND",
            Self::NotCancellable => "NOT_CANCELLABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::InvalidAmount | Self::AmountOutOfBounds { .. } | Self::InvalidDestination(_) => {
                400
            }

            // 404 Not Found
            Self::EntryNotFound(_) | Self::WalletNotFound(_) => 404,

            // 409 Conflict - already settled by a concurrent path
            Self::NotCancellable | Self::AlreadyTerminal => 409,

            // 422 Unprocessable - business rule violations
            Self::NoDestinationOnFile
            | Self::InsufficientBalance { .. }
            | Self::TooManyPending { .. }
            | Self::OverUserLimit { .. }
            | Self::GatewayRejected(_) => 422,

            // 502 Bad Gateway - provider unreachable
            Self::GatewayUnreachable(_) => 502,

            // 500 Internal Server Error
            Self::UnknownReference(_) | Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns true if retrying the same operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::GatewayUnreachable(_) | Self::Database(_))
    }
}
