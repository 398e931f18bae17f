//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for payments and wallets
//! - Inbound gateway webhook endpoints
//! - Authentication middleware
//! - Response types

pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use kavera_settlement::PaymentService;
use kavera_shared::JwtService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Payment orchestration service.
    pub payments: Arc<PaymentService>,
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// Shared secret for gateway webhook signatures.
    pub webhook_secret: Arc<str>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
