//! Shared types, errors, and configuration for Kavera.
//!
//! This crate provides common types used across all other crates:
//! - Money types with decimal precision
//! - Typed IDs for type-safe entity references
//! - Pagination types for list endpoints
//! - Application-wide error types
//! - Configuration management
//! - JWT validation for tokens issued by the identity provider
//! - Fire-and-forget transition notifications

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod notify;
pub mod types;

pub use auth::Claims;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use jwt::{JwtConfig, JwtError, JwtService};
pub use notify::{NotificationService, NotifyError};
