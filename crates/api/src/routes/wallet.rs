//! Wallet routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;

use crate::{AppState, middleware::AuthUser, routes::payments::error_response};

/// Creates the wallet routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/wallet", get(get_wallet))
}

/// Response for the caller's wallet.
#[derive(Debug, Serialize)]
pub struct WalletResponse {
    /// Current balance in the smallest currency unit.
    pub balance: String,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Payout destination on file, if any.
    pub destination_msisdn: Option<String>,
}

/// GET `/wallet` - The caller's balance and destination on file.
async fn get_wallet(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    match state.payments.wallet_for(auth.user_id()).await {
        Ok(wallet) => (
            StatusCode::OK,
            Json(WalletResponse {
                balance: wallet.balance.to_string(),
                currency: wallet.currency.to_string(),
                destination_msisdn: wallet.destination_msisdn,
            }),
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
