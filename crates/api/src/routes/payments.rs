//! Payment routes: deposits, withdrawals, status, cancellation, history.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;
use tracing::error;
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, middleware::AuthUser};
use kavera_core::ledger::{LedgerEntry, SettlementError};
use kavera_settlement::PaymentRequest;
use kavera_shared::types::{LedgerEntryId, PageRequest, PageResponse};

/// Creates the payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments", get(list_payments))
        .route("/payments/deposits", post(create_deposit))
        .route("/payments/withdrawals", post(create_withdrawal))
        .route("/payments/{entry_id}", get(get_payment))
        .route("/payments/{entry_id}/cancel", post(cancel_payment))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for deposits and withdrawals.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    /// Amount in the smallest currency unit, as a decimal string.
    pub amount: String,
    /// Optional description, shown on the payer's phone.
    #[validate(length(max = 140))]
    pub description: Option<String>,
}

/// Response for a single payment.
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    /// Entry ID.
    pub entry_id: Uuid,
    /// "deposit" or "withdrawal".
    pub kind: String,
    /// Amount in the smallest currency unit.
    pub amount: String,
    /// Current status.
    pub status: String,
    /// Destination MSISDN.
    pub destination: String,
    /// Caller-supplied description.
    pub description: Option<String>,
    /// Failure reason, when failed.
    pub failure_reason: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Completion timestamp, when completed.
    pub completed_at: Option<String>,
}

fn payment_response(entry: &LedgerEntry) -> PaymentResponse {
    PaymentResponse {
        entry_id: entry.id.into_inner(),
        kind: entry.kind.to_string(),
        amount: entry.amount.to_string(),
        status: entry.status.to_string(),
        destination: entry.destination.clone(),
        description: entry.description.clone(),
        failure_reason: entry.failure_reason.clone(),
        created_at: entry.created_at.to_rfc3339(),
        completed_at: entry.completed_at.map(|at| at.to_rfc3339()),
    }
}

/// Maps a settlement error to the house JSON error shape.
pub(crate) fn error_response(error: &SettlementError) -> Response {
    let status = StatusCode::from_u16(error.http_status_code())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let message = if status.is_server_error() {
        error!(error = %error, "payment operation failed");
        "An error occurred".to_string()
    } else {
        error.to_string()
    };

    (
        status,
        Json(json!({
            "error": error.error_code(),
            "message": message
        })),
    )
        .into_response()
}

/// Parses and pre-validates the request body. Full validation happens in
/// the settlement core; this only rejects unparseable input.
fn parse_payment_request(
    payload: &CreatePaymentRequest,
) -> Result<PaymentRequest, Response> {
    if payload.validate().is_err() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "VALIDATION_ERROR",
                "message": "Description is too long"
            })),
        )
            .into_response());
    }

    let Ok(amount) = Decimal::from_str(&payload.amount) else {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "INVALID_AMOUNT",
                "message": "Amount must be a decimal string"
            })),
        )
            .into_response());
    };

    Ok(PaymentRequest {
        amount,
        description: payload.description.clone(),
    })
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/payments/deposits` - Start a deposit.
async fn create_deposit(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreatePaymentRequest>,
) -> impl IntoResponse {
    let request = match parse_payment_request(&payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.payments.deposit(auth.user_id(), request).await {
        Ok(entry) => (
            StatusCode::CREATED,
            Json(json!({
                "entry_id": entry.id.into_inner(),
                "status": entry.status.to_string(),
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST `/payments/withdrawals` - Start a withdrawal.
async fn create_withdrawal(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(payload): Json<CreatePaymentRequest>,
) -> impl IntoResponse {
    let request = match parse_payment_request(&payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match state.payments.withdraw(auth.user_id(), request).await {
        Ok(receipt) => (
            StatusCode::CREATED,
            Json(json!({
                "entry_id": receipt.entry.id.into_inner(),
                "status": receipt.entry.status.to_string(),
                "new_balance": receipt.new_balance.to_string(),
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET `/payments/{entry_id}` - Payment status, polling the provider on
/// demand while the entry is still open.
async fn get_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(entry_id): Path<Uuid>,
) -> impl IntoResponse {
    let entry_id = LedgerEntryId::from_uuid(entry_id);

    match state.payments.entry_status(auth.user_id(), entry_id).await {
        Ok(entry) => (StatusCode::OK, Json(payment_response(&entry))).into_response(),
        Err(e) => error_response(&e),
    }
}

/// POST `/payments/{entry_id}/cancel` - Cancel an open payment.
async fn cancel_payment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(entry_id): Path<Uuid>,
) -> impl IntoResponse {
    let entry_id = LedgerEntryId::from_uuid(entry_id);

    match state.payments.cancel(auth.user_id(), entry_id).await {
        Ok(entry) => (
            StatusCode::OK,
            Json(json!({
                "entry_id": entry.id.into_inner(),
                "status": entry.status.to_string(),
            })),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET `/payments` - The caller's payment history, newest first.
async fn list_payments(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(page): Query<PageRequest>,
) -> impl IntoResponse {
    match state
        .payments
        .list_entries(auth.user_id(), page.offset(), page.limit())
        .await
    {
        Ok((entries, total)) => {
            let items: Vec<PaymentResponse> = entries.iter().map(payment_response).collect();
            let response = PageResponse::new(items, page.page, page.per_page, total);
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => error_response(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn body(amount: &str, description: Option<&str>) -> CreatePaymentRequest {
        CreatePaymentRequest {
            amount: amount.to_string(),
            description: description.map(String::from),
        }
    }

    #[test]
    fn test_parse_valid_request() {
        let parsed = parse_payment_request(&body("500", Some("lunch money"))).unwrap();
        assert_eq!(parsed.amount, dec!(500));
        assert_eq!(parsed.description.as_deref(), Some("lunch money"));
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case("12,5")]
    fn test_unparseable_amount_rejected(#[case] amount: &str) {
        assert!(parse_payment_request(&body(amount, None)).is_err());
    }

    #[test]
    fn test_overlong_description_rejected() {
        let long = "x".repeat(141);
        assert!(parse_payment_request(&body("500", Some(&long))).is_err());
    }
}
