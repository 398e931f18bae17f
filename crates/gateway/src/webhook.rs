//! Webhook payload normalization.
//!
//! The provider delivers confirmations and timeout notices as JSON webhooks.
//! This module parses them into the provider-status vocabulary the
//! settlement core understands; delivery-order and duplicate handling are
//! the core's problem, not ours.

use serde::Deserialize;

use kavera_core::provider::{ProviderError, ProviderStatus};

/// Raw webhook body as the provider sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    /// Provider-assigned request id of the movement.
    pub request_id: String,
    /// Provider status word.
    pub status: String,
    /// Confirmation id, present on success.
    #[serde(default)]
    pub confirmation_id: Option<String>,
    /// Failure reason, present on failure and timeout notices.
    #[serde(default)]
    pub reason: Option<String>,
}

impl WebhookPayload {
    /// Normalizes the provider status word into a [`ProviderStatus`].
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidResponse`] for status words outside
    /// the provider contract.
    pub fn into_status(self) -> Result<ProviderStatus, ProviderError> {
        map_status_word(&self.status, self.confirmation_id, self.reason)
    }
}

/// Maps a provider status word onto [`ProviderStatus`].
///
/// # Errors
///
/// Returns [`ProviderError::InvalidResponse`] for unknown words.
pub(crate) fn map_status_word(
    status: &str,
    confirmation_id: Option<String>,
    reason: Option<String>,
) -> Result<ProviderStatus, ProviderError> {
    match status {
        "pending" | "accepted" | "submitted" => Ok(ProviderStatus::InFlight),
        "successful" | "succeeded" => Ok(ProviderStatus::Succeeded { confirmation_id }),
        "failed" | "rejected" | "timeout" | "expired" => Ok(ProviderStatus::Failed {
            reason: reason.unwrap_or_else(|| status.to_string()),
        }),
        other => Err(ProviderError::InvalidResponse(format!(
            "unknown provider status: {other}"
        ))),
    }
}
