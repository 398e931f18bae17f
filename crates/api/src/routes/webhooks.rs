//! Inbound gateway webhook endpoints.
//!
//! The provider pushes confirmation and timeout notices here. The endpoint
//! is public; authenticity comes from the payload signature. Per the
//! provider's acknowledgment contract, every verified delivery is answered
//! with an ack - including duplicates and unknown references - so the
//! provider stops redelivering events we have already handled.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::json;
use tracing::{error, info, warn};

use crate::AppState;
use kavera_core::ledger::SettlementError;
use kavera_gateway::{WebhookPayload, verify_signature};

/// Signature header the provider sends with every webhook.
const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Creates the webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhooks/gateway", post(gateway_webhook))
}

fn ack() -> Response {
    (StatusCode::OK, Json(json!({ "status": "received" }))).into_response()
}

/// POST `/webhooks/gateway` - Confirmation and timeout notices.
async fn gateway_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let Some(signature) = signature else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "missing_signature",
                "message": "Signature header is required"
            })),
        )
            .into_response();
    };

    if !verify_signature(&state.webhook_secret, &body, signature) {
        warn!("webhook signature verification failed");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "error": "invalid_signature",
                "message": "Signature verification failed"
            })),
        )
            .into_response();
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "unparseable webhook body");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": "invalid_payload",
                    "message": "Body is not a valid webhook payload"
                })),
            )
                .into_response();
        }
    };

    let reference = payload.request_id.clone();
    let status = match payload.into_status() {
        Ok(status) => status,
        Err(e) => {
            // Unknown status words are logged and acked; redelivery would
            // not improve them.
            warn!(%reference, error = %e, "webhook with unknown status word");
            return ack();
        }
    };

    match state.payments.handle_confirmation(&reference, status).await {
        Ok(outcome) => {
            info!(
                %reference,
                status = %outcome.entry().status,
                applied = outcome.was_applied(),
                "webhook processed"
            );
        }
        Err(SettlementError::UnknownReference(_)) => {
            // The provider may deliver before our accept write lands, or
            // retry something long gone. Logged, acked, not re-applied.
            warn!(%reference, "webhook for unknown reference ignored");
        }
        Err(e) => {
            // Internal trouble: still ack per the provider contract; the
            // sweeper converges the entry later.
            error!(%reference, error = %e, "webhook processing failed");
        }
    }

    ack()
}
