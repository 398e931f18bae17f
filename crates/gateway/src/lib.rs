//! HTTP client for the push-payment provider.
//!
//! This crate implements the [`ProviderClient`](kavera_core::provider::ProviderClient)
//! contract over the provider's REST API:
//! - `initiate` posts collections (deposits) and payouts (withdrawals)
//! - `query_status` polls a movement by its provider request id
//! - OAuth bearer tokens are cached per client instance with expiry
//! - webhook payloads are signature-checked and normalized

pub mod client;
pub mod signature;
pub mod token;
pub mod webhook;

pub use client::HttpProviderClient;
pub use signature::{sign_payload, verify_signature};
pub use token::TokenCache;
pub use webhook::WebhookPayload;
