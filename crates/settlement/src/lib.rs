//! Payment orchestration and the reconciliation sweeper.
//!
//! This crate wires the pure settlement core to its collaborators:
//! - [`PaymentService`] drives deposits, withdrawals, cancellations, and
//!   confirmation handling - webhook deliveries and sweeper polls converge
//!   on one settle path
//! - [`Sweeper`] is the single-flight periodic task that resolves stale
//!   entries and archives old failures

pub mod service;
pub mod sweeper;

pub use service::{PaymentRequest, PaymentService, ServiceConfig, SettleOutcome, WithdrawalReceipt};
pub use sweeper::{SweepStats, Sweeper};
