//! HTTP implementation of the provider contract.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use kavera_core::ledger::EntryKind;
use kavera_core::provider::{
    InitiateRequest, ProviderAcceptance, ProviderClient, ProviderError, ProviderStatus,
};
use kavera_shared::config::GatewayConfig;

use crate::token::TokenCache;
use crate::webhook::map_status_word;

/// HTTP client for the push-payment provider API.
///
/// Owns its token cache; no process-wide state.
pub struct HttpProviderClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<TokenCache>,
}

impl std::fmt::Debug for HttpProviderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProviderClient")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Serialize)]
struct InitiatePayload<'a> {
    amount: String,
    currency: String,
    msisdn: &'a str,
    external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    narration: Option<&'a str>,
}

#[derive(Deserialize)]
struct InitiateResponse {
    request_id: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    confirmation_id: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl HttpProviderClient {
    /// Creates a client from gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: Mutex::new(TokenCache::new()),
        })
    }

    /// Returns a valid bearer token, refreshing through the provider's
    /// token endpoint when the cached one has expired.
    async fn bearer_token(&self) -> Result<String, ProviderError> {
        let mut cache = self.token.lock().await;

        if let Some(token) = cache.valid_token(Utc::now()) {
            return Ok(token.to_string());
        }

        debug!("refreshing provider access token");
        let response = self
            .http
            .post(format!("{}/oauth/token", self.base_url))
            .json(&TokenRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
                grant_type: "client_credentials",
            })
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(ProviderError::Auth(format!(
                "token endpoint returned {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        cache.store(token.access_token.clone(), token.expires_in, Utc::now());
        Ok(token.access_token)
    }

    fn initiate_url(&self, kind: EntryKind) -> String {
        match kind {
            // Collections pull money from the payer's mobile-money account,
            // payouts push money out to it.
            EntryKind::Deposit => format!("{}/v1/collections", self.base_url),
            EntryKind::Withdrawal => format!("{}/v1/payouts", self.base_url),
        }
    }
}

#[async_trait]
impl ProviderClient for HttpProviderClient {
    async fn initiate(
        &self,
        request: &InitiateRequest,
    ) -> Result<ProviderAcceptance, ProviderError> {
        let token = self.bearer_token().await?;

        let payload = InitiatePayload {
            amount: request.amount.to_string(),
            currency: request.currency.to_string(),
            msisdn: &request.destination,
            external_id: request.correlation_id.to_string(),
            narration: request.narration.as_deref(),
        };

        let response = self
            .http
            .post(self.initiate_url(request.kind))
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            let body: InitiateResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
            debug!(request_id = %body.request_id, "provider accepted request");
            return Ok(ProviderAcceptance {
                provider_request_id: body.request_id,
            });
        }

        if status.is_client_error() {
            let reason = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| format!("provider returned {status}"));
            warn!(%status, %reason, "provider rejected request");
            return Err(ProviderError::Rejected { reason });
        }

        // 5xx: the provider may or may not have registered the request.
        Err(ProviderError::Unreachable {
            reason: format!("provider returned {status}"),
        })
    }

    async fn query_status(
        &self,
        provider_request_id: &str,
    ) -> Result<ProviderStatus, ProviderError> {
        let token = self.bearer_token().await?;

        let response = self
            .http
            .get(format!("{}/v1/requests/{provider_request_id}", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Unreachable {
                reason: format!("status endpoint returned {status}"),
            });
        }

        let body: StatusResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        map_status_word(&body.status, body.confirmation_id, body.reason)
    }
}

/// Transport failures are ambiguous: the request may have reached the
/// provider. They are never mapped to a rejection.
fn map_transport_error(error: reqwest::Error) -> ProviderError {
    if error.is_timeout() || error.is_connect() {
        ProviderError::Unreachable {
            reason: error.to_string(),
        }
    } else {
        ProviderError::InvalidResponse(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kavera_shared::types::{Currency, LedgerEntryId};
    use rust_decimal_macros::dec;

    fn config() -> GatewayConfig {
        GatewayConfig {
            base_url: "https://gateway.test/".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            webhook_secret: "whsec".to_string(),
            timeout_secs: 10,
            min_amount: 500,
            max_amount: 5_000_000,
            currency: "UGX".to_string(),
        }
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpProviderClient::new(&config()).unwrap();
        assert_eq!(client.base_url, "https://gateway.test");
    }

    #[test]
    fn test_initiate_url_by_kind() {
        let client = HttpProviderClient::new(&config()).unwrap();
        assert_eq!(
            client.initiate_url(EntryKind::Deposit),
            "https://gateway.test/v1/collections"
        );
        assert_eq!(
            client.initiate_url(EntryKind::Withdrawal),
            "https://gateway.test/v1/payouts"
        );
    }

    #[test]
    fn test_initiate_payload_shape() {
        let request = InitiateRequest {
            kind: EntryKind::Deposit,
            amount: dec!(5000),
            currency: Currency::Ugx,
            destination: "256700000001".to_string(),
            correlation_id: LedgerEntryId::new(),
            narration: None,
        };

        let payload = InitiatePayload {
            amount: request.amount.to_string(),
            currency: request.currency.to_string(),
            msisdn: &request.destination,
            external_id: request.correlation_id.to_string(),
            narration: request.narration.as_deref(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["amount"], "5000");
        assert_eq!(json["currency"], "UGX");
        assert_eq!(json["msisdn"], "256700000001");
        assert!(json.get("narration").is_none());
    }
}
