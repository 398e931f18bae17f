//! Push-payment provider contract.
//!
//! The settlement core talks to the external provider only through
//! [`ProviderClient`]. The HTTP implementation lives in `kavera-gateway`;
//! tests substitute their own.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use kavera_shared::types::{Currency, LedgerEntryId};

use crate::ledger::EntryKind;

/// An outbound payment request.
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    /// Deposit (collection) or withdrawal (payout).
    pub kind: EntryKind,
    /// Amount in the smallest currency unit.
    pub amount: Decimal,
    /// Currency the amount is denominated in.
    pub currency: Currency,
    /// MSISDN the money moves to or from.
    pub destination: String,
    /// Our ledger entry id, echoed back by the provider for correlation.
    pub correlation_id: LedgerEntryId,
    /// Human-readable narration shown on the payer's phone.
    pub narration: Option<String>,
}

/// A successful synchronous acceptance from the provider.
#[derive(Debug, Clone)]
pub struct ProviderAcceptance {
    /// Provider-assigned request id; the idempotency key for every later
    /// confirmation about this movement.
    pub provider_request_id: String,
}

/// Provider-reported state of a movement, as returned by a status poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ProviderStatus {
    /// The provider is still waiting on the payer or downstream network.
    InFlight,
    /// The movement succeeded.
    Succeeded {
        /// Provider-assigned confirmation id, when supplied.
        confirmation_id: Option<String>,
    },
    /// The movement failed.
    Failed {
        /// Provider-supplied failure reason.
        reason: String,
    },
}

/// Errors from the provider client.
///
/// `Rejected` is a definitive synchronous decline; `Unreachable` is
/// ambiguous - the request may or may not have reached the provider - and
/// must never be treated as a failure confirmation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The provider declined the request synchronously.
    #[error("provider rejected the request: {reason}")]
    Rejected {
        /// Provider-supplied decline reason.
        reason: String,
    },

    /// The provider could not be reached or timed out.
    #[error("provider unreachable: {reason}")]
    Unreachable {
        /// Transport-level description.
        reason: String,
    },

    /// The provider answered with something we cannot interpret.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),

    /// Authentication against the provider failed.
    #[error("provider authentication failed: {0}")]
    Auth(String),
}

impl ProviderError {
    /// Returns true if the outcome of the attempted call is unknown.
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

/// Client for the external push-payment provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Initiates a payment. On success the movement is accepted and will be
    /// confirmed asynchronously via webhook or status poll.
    async fn initiate(&self, request: &InitiateRequest)
    -> Result<ProviderAcceptance, ProviderError>;

    /// Polls the provider for the state of an accepted movement.
    async fn query_status(&self, provider_request_id: &str)
    -> Result<ProviderStatus, ProviderError>;
}
