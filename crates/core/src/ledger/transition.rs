//! The ledger-entry state machine as a pure transition function.
//!
//! Every mutation of a ledger entry - webhook confirmation, sweeper poll,
//! user cancellation, retention sweep - is expressed as a
//! [`TransitionEvent`] and applied through [`apply_transition`]. The
//! function is pure: it takes the current entry snapshot and returns the
//! next snapshot plus the wallet-balance effect the caller must persist in
//! the same storage transaction as the status write. There are no hidden
//! mutation-triggered side effects.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use super::entry::{EntryKind, EntryStatus, LedgerEntry};

/// An event that may move a ledger entry along its state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionEvent {
    /// The provider accepted the request and assigned a request id.
    GatewayAccepted {
        /// Provider-assigned request id.
        provider_request_id: String,
    },
    /// The provider declined the request synchronously.
    GatewayRejected {
        /// Provider-supplied decline reason.
        reason: String,
    },
    /// A confirmation reported the movement succeeded.
    ConfirmationSucceeded {
        /// Provider-assigned confirmation id, when supplied.
        confirmation_id: Option<String>,
    },
    /// A confirmation reported the movement failed or timed out.
    ConfirmationFailed {
        /// Provider-supplied failure reason.
        reason: String,
    },
    /// A sweeper poll could not settle the entry (provider still pending,
    /// or unreachable). Bounded by `max_retries`.
    PollAmbiguous,
    /// The no-reference grace period expired: the request never reached
    /// the provider.
    NoProviderReference,
    /// The user (or an operator) cancelled the entry.
    Cancelled,
    /// The retention sweep archives an old failed entry.
    Archived,
}

impl TransitionEvent {
    /// Short name for logging and error messages.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GatewayAccepted { .. } => "gateway_accepted",
            Self::GatewayRejected { .. } => "gateway_rejected",
            Self::ConfirmationSucceeded { .. } => "confirmation_succeeded",
            Self::ConfirmationFailed { .. } => "confirmation_failed",
            Self::PollAmbiguous => "poll_ambiguous",
            Self::NoProviderReference => "no_provider_reference",
            Self::Cancelled => "cancelled",
            Self::Archived => "archived",
        }
    }
}

/// Wallet-balance effect of a transition.
///
/// Exactly one effect other than `None` is ever produced per entry over its
/// whole lifetime: `Credit` when a deposit completes, `Refund` when a
/// withdrawal's reservation is released. The withdrawal reservation itself
/// happens at creation time, outside the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceEffect {
    /// No balance change.
    None,
    /// Credit the wallet (deposit completed).
    Credit(Decimal),
    /// Return a withdrawal reservation to the wallet.
    Refund(Decimal),
}

impl BalanceEffect {
    /// Signed delta this effect applies to the wallet balance.
    #[must_use]
    pub fn delta(&self) -> Decimal {
        match self {
            Self::None => Decimal::ZERO,
            Self::Credit(amount) | Self::Refund(amount) => *amount,
        }
    }
}

/// Result of applying a transition: the next entry snapshot and the
/// paired balance effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionOutcome {
    /// The entry as it must be persisted.
    pub entry: LedgerEntry,
    /// The wallet write that must land in the same storage transaction.
    pub effect: BalanceEffect,
}

/// Errors from the transition function.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The entry is already in a terminal state. Callers treat this as a
    /// success-no-op: the race loser must not mutate anything.
    #[error("entry is already terminal ({status})")]
    AlreadyTerminal {
        /// The terminal status observed.
        status: EntryStatus,
    },

    /// The event does not apply to the entry's current status.
    #[error("event {event} does not apply to status {from}")]
    InvalidTransition {
        /// Status the entry was in.
        from: EntryStatus,
        /// Name of the rejected event.
        event: &'static str,
    },
}

/// Applies `event` to `entry`, returning the next snapshot and balance
/// effect.
///
/// The caller persists the outcome with a compare-and-set on the status the
/// snapshot was computed from; a lost race surfaces as a stale status there,
/// never as a double-applied effect here.
///
/// # Errors
///
/// Returns [`TransitionError::AlreadyTerminal`] when the entry has already
/// reached `completed` or `cancelled`, and
/// [`TransitionError::InvalidTransition`] for an event that does not apply
/// to the current status.
pub fn apply_transition(
    entry: &LedgerEntry,
    event: &TransitionEvent,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, TransitionError> {
    if entry.is_terminal() {
        return Err(TransitionError::AlreadyTerminal {
            status: entry.status,
        });
    }

    match (entry.status, event) {
        (EntryStatus::Pending, TransitionEvent::GatewayAccepted { provider_request_id }) => {
            let mut next = entry.clone();
            next.status = EntryStatus::Processing;
            next.provider_request_id = Some(provider_request_id.clone());
            next.updated_at = now;
            Ok(TransitionOutcome {
                entry: next,
                effect: BalanceEffect::None,
            })
        }

        (EntryStatus::Pending, TransitionEvent::GatewayRejected { reason }) => {
            Ok(fail(entry, reason.clone(), now))
        }

        (EntryStatus::Pending, TransitionEvent::NoProviderReference) => Ok(fail(
            entry,
            "request never reached the provider".to_string(),
            now,
        )),

        (EntryStatus::Processing, TransitionEvent::ConfirmationSucceeded { confirmation_id }) => {
            let mut next = entry.clone();
            next.status = EntryStatus::Completed;
            next.provider_confirmation_id = confirmation_id.clone();
            next.completed_at = Some(now);
            next.updated_at = now;
            let effect = match entry.kind {
                // The withdrawal debit was reserved at creation; success
                // just finalizes it.
                EntryKind::Withdrawal => BalanceEffect::None,
                EntryKind::Deposit => BalanceEffect::Credit(entry.amount),
            };
            Ok(TransitionOutcome {
                entry: next,
                effect,
            })
        }

        (EntryStatus::Processing, TransitionEvent::ConfirmationFailed { reason }) => {
            Ok(fail(entry, reason.clone(), now))
        }

        (EntryStatus::Processing, TransitionEvent::PollAmbiguous) => {
            let attempts = entry.retry_count.saturating_add(1);
            if attempts >= entry.max_retries {
                let mut outcome = fail(entry, "reconciliation retries exhausted".to_string(), now);
                outcome.entry.retry_count = attempts;
                Ok(outcome)
            } else {
                let mut next = entry.clone();
                next.retry_count = attempts;
                next.updated_at = now;
                Ok(TransitionOutcome {
                    entry: next,
                    effect: BalanceEffect::None,
                })
            }
        }

        (EntryStatus::Pending | EntryStatus::Processing, TransitionEvent::Cancelled) => {
            let mut next = entry.clone();
            next.status = EntryStatus::Cancelled;
            next.cancelled_at = Some(now);
            next.updated_at = now;
            Ok(TransitionOutcome {
                entry: next,
                effect: release_reservation(entry),
            })
        }

        (EntryStatus::Failed, TransitionEvent::Archived) => {
            let mut next = entry.clone();
            next.status = EntryStatus::Cancelled;
            next.cancelled_at = Some(now);
            next.updated_at = now;
            // Bookkeeping only; the reservation was refunded on `failed`.
            Ok(TransitionOutcome {
                entry: next,
                effect: BalanceEffect::None,
            })
        }

        (from, event) => Err(TransitionError::InvalidTransition {
            from,
            event: event.name(),
        }),
    }
}

/// Builds the `failed` outcome shared by every failure path.
fn fail(entry: &LedgerEntry, reason: String, now: DateTime<Utc>) -> TransitionOutcome {
    let mut next = entry.clone();
    next.status = EntryStatus::Failed;
    next.failure_reason = Some(reason);
    next.failed_at = Some(now);
    next.updated_at = now;
    TransitionOutcome {
        entry: next,
        effect: release_reservation(entry),
    }
}

/// Refund the reserved amount for withdrawals; deposits reserve nothing.
fn release_reservation(entry: &LedgerEntry) -> BalanceEffect {
    match entry.kind {
        EntryKind::Withdrawal => BalanceEffect::Refund(entry.amount),
        EntryKind::Deposit => BalanceEffect::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kavera_shared::types::WalletId;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn entry(kind: EntryKind, status: EntryStatus) -> LedgerEntry {
        let mut e = LedgerEntry::new(
            WalletId::new(),
            kind,
            dec!(1000),
            "256700000001".to_string(),
            None,
            3,
            Utc::now(),
        );
        e.status = status;
        if status != EntryStatus::Pending {
            e.provider_request_id = Some("req-1".to_string());
        }
        e
    }

    #[test]
    fn test_accept_moves_pending_to_processing() {
        let e = entry(EntryKind::Deposit, EntryStatus::Pending);
        let outcome = apply_transition(
            &e,
            &TransitionEvent::GatewayAccepted {
                provider_request_id: "req-42".to_string(),
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcome.entry.status, EntryStatus::Processing);
        assert_eq!(outcome.entry.provider_request_id.as_deref(), Some("req-42"));
        assert_eq!(outcome.effect, BalanceEffect::None);
    }

    #[test]
    fn test_deposit_success_credits_once() {
        let e = entry(EntryKind::Deposit, EntryStatus::Processing);
        let outcome = apply_transition(
            &e,
            &TransitionEvent::ConfirmationSucceeded {
                confirmation_id: Some("conf-7".to_string()),
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcome.entry.status, EntryStatus::Completed);
        assert_eq!(outcome.effect, BalanceEffect::Credit(dec!(1000)));
        assert!(outcome.entry.completed_at.is_some());
        assert_eq!(
            outcome.entry.provider_confirmation_id.as_deref(),
            Some("conf-7")
        );
    }

    #[test]
    fn test_withdrawal_success_has_no_effect() {
        let e = entry(EntryKind::Withdrawal, EntryStatus::Processing);
        let outcome = apply_transition(
            &e,
            &TransitionEvent::ConfirmationSucceeded {
                confirmation_id: None,
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcome.entry.status, EntryStatus::Completed);
        assert_eq!(outcome.effect, BalanceEffect::None);
    }

    #[rstest]
    #[case(EntryKind::Deposit, BalanceEffect::None)]
    #[case(EntryKind::Withdrawal, BalanceEffect::Refund(dec!(1000)))]
    fn test_confirmation_failure_releases_reservation(
        #[case] kind: EntryKind,
        #[case] expected: BalanceEffect,
    ) {
        let e = entry(kind, EntryStatus::Processing);
        let outcome = apply_transition(
            &e,
            &TransitionEvent::ConfirmationFailed {
                reason: "payer declined".to_string(),
            },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcome.entry.status, EntryStatus::Failed);
        assert_eq!(outcome.effect, expected);
        assert_eq!(
            outcome.entry.failure_reason.as_deref(),
            Some("payer declined")
        );
        assert!(outcome.entry.failed_at.is_some());
    }

    #[rstest]
    #[case(EntryStatus::Pending)]
    #[case(EntryStatus::Processing)]
    fn test_cancel_refunds_withdrawal(#[case] status: EntryStatus) {
        let e = entry(EntryKind::Withdrawal, status);
        let outcome = apply_transition(&e, &TransitionEvent::Cancelled, Utc::now()).unwrap();

        assert_eq!(outcome.entry.status, EntryStatus::Cancelled);
        assert_eq!(outcome.effect, BalanceEffect::Refund(dec!(1000)));
        assert!(outcome.entry.cancelled_at.is_some());
    }

    #[test]
    fn test_poll_ambiguous_increments_below_bound() {
        let e = entry(EntryKind::Deposit, EntryStatus::Processing);
        let outcome = apply_transition(&e, &TransitionEvent::PollAmbiguous, Utc::now()).unwrap();

        assert_eq!(outcome.entry.status, EntryStatus::Processing);
        assert_eq!(outcome.entry.retry_count, 1);
        assert_eq!(outcome.effect, BalanceEffect::None);
    }

    #[test]
    fn test_poll_ambiguous_forces_failed_at_bound() {
        let mut e = entry(EntryKind::Withdrawal, EntryStatus::Processing);
        e.retry_count = 2; // max_retries is 3

        let outcome = apply_transition(&e, &TransitionEvent::PollAmbiguous, Utc::now()).unwrap();

        assert_eq!(outcome.entry.status, EntryStatus::Failed);
        assert_eq!(outcome.entry.retry_count, 3);
        assert_eq!(outcome.effect, BalanceEffect::Refund(dec!(1000)));
    }

    #[test]
    fn test_no_provider_reference_fails_pending() {
        let e = entry(EntryKind::Deposit, EntryStatus::Pending);
        let outcome =
            apply_transition(&e, &TransitionEvent::NoProviderReference, Utc::now()).unwrap();

        assert_eq!(outcome.entry.status, EntryStatus::Failed);
        assert_eq!(outcome.effect, BalanceEffect::None);
    }

    #[test]
    fn test_archive_failed_entry() {
        let e = entry(EntryKind::Withdrawal, EntryStatus::Failed);
        let outcome = apply_transition(&e, &TransitionEvent::Archived, Utc::now()).unwrap();

        assert_eq!(outcome.entry.status, EntryStatus::Cancelled);
        // No balance effect: the refund already happened on `failed`.
        assert_eq!(outcome.effect, BalanceEffect::None);
    }

    #[rstest]
    #[case(EntryStatus::Completed)]
    #[case(EntryStatus::Cancelled)]
    fn test_terminal_states_absorb_everything(#[case] status: EntryStatus) {
        let e = entry(EntryKind::Deposit, status);
        let result = apply_transition(
            &e,
            &TransitionEvent::ConfirmationSucceeded {
                confirmation_id: None,
            },
            Utc::now(),
        );
        assert_eq!(result, Err(TransitionError::AlreadyTerminal { status }));

        let result = apply_transition(&e, &TransitionEvent::Cancelled, Utc::now());
        assert_eq!(result, Err(TransitionError::AlreadyTerminal { status }));
    }

    #[test]
    fn test_confirmation_does_not_apply_to_pending() {
        let e = entry(EntryKind::Deposit, EntryStatus::Pending);
        let result = apply_transition(
            &e,
            &TransitionEvent::ConfirmationSucceeded {
                confirmation_id: None,
            },
            Utc::now(),
        );
        assert_eq!(
            result,
            Err(TransitionError::InvalidTransition {
                from: EntryStatus::Pending,
                event: "confirmation_succeeded",
            })
        );
    }

    #[test]
    fn test_failed_rejects_cancel() {
        let e = entry(EntryKind::Withdrawal, EntryStatus::Failed);
        let result = apply_transition(&e, &TransitionEvent::Cancelled, Utc::now());
        assert!(matches!(
            result,
            Err(TransitionError::InvalidTransition { .. })
        ));
    }
}
