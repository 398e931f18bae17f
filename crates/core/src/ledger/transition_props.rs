//! Property tests for the transition function.

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;

use kavera_shared::types::WalletId;

use super::entry::{EntryKind, EntryStatus, LedgerEntry};
use super::transition::{BalanceEffect, TransitionError, TransitionEvent, apply_transition};

fn amount_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(Decimal::from)
}

fn kind_strategy() -> impl Strategy<Value = EntryKind> {
    prop_oneof![Just(EntryKind::Deposit), Just(EntryKind::Withdrawal)]
}

fn status_strategy() -> impl Strategy<Value = EntryStatus> {
    prop_oneof![
        Just(EntryStatus::Pending),
        Just(EntryStatus::Processing),
        Just(EntryStatus::Completed),
        Just(EntryStatus::Failed),
        Just(EntryStatus::Cancelled),
    ]
}

fn event_strategy() -> impl Strategy<Value = TransitionEvent> {
    prop_oneof![
        "[a-z0-9-]{4,12}".prop_map(|id| TransitionEvent::GatewayAccepted {
            provider_request_id: id,
        }),
        "[a-z ]{4,20}".prop_map(|reason| TransitionEvent::GatewayRejected { reason }),
        proptest::option::of("[a-z0-9-]{4,12}".prop_map(String::from)).prop_map(|confirmation_id| {
            TransitionEvent::ConfirmationSucceeded { confirmation_id }
        }),
        "[a-z ]{4,20}".prop_map(|reason| TransitionEvent::ConfirmationFailed { reason }),
        Just(TransitionEvent::PollAmbiguous),
        Just(TransitionEvent::NoProviderReference),
        Just(TransitionEvent::Cancelled),
        Just(TransitionEvent::Archived),
    ]
}

fn entry_with(kind: EntryKind, status: EntryStatus, amount: Decimal) -> LedgerEntry {
    let mut entry = LedgerEntry::new(
        WalletId::new(),
        kind,
        amount,
        "256700000001".to_string(),
        None,
        5,
        Utc::now(),
    );
    entry.status = status;
    if status != EntryStatus::Pending {
        entry.provider_request_id = Some("req-prop".to_string());
    }
    entry
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Terminal states absorb every event: nothing leaves `completed` or
    /// `cancelled`.
    #[test]
    fn prop_terminal_states_absorb_all_events(
        kind in kind_strategy(),
        amount in amount_strategy(),
        event in event_strategy(),
        terminal in prop_oneof![Just(EntryStatus::Completed), Just(EntryStatus::Cancelled)],
    ) {
        let entry = entry_with(kind, terminal, amount);
        let result = apply_transition(&entry, &event, Utc::now());
        prop_assert_eq!(result, Err(TransitionError::AlreadyTerminal { status: terminal }));
    }

    /// Every successful transition moves the status forward; `pending` is
    /// never re-entered and `processing` is only ever re-entered by the
    /// bounded ambiguity retry.
    #[test]
    fn prop_status_is_monotonic(
        kind in kind_strategy(),
        amount in amount_strategy(),
        status in status_strategy(),
        event in event_strategy(),
    ) {
        let entry = entry_with(kind, status, amount);
        if let Ok(outcome) = apply_transition(&entry, &event, Utc::now()) {
            prop_assert_ne!(outcome.entry.status, EntryStatus::Pending);
            if outcome.entry.status == EntryStatus::Processing && status == EntryStatus::Processing {
                prop_assert_eq!(&event, &TransitionEvent::PollAmbiguous);
                prop_assert_eq!(outcome.entry.retry_count, entry.retry_count + 1);
            }
        }
    }

    /// Over any event sequence, the balance moves by at most one non-zero
    /// effect, and that effect matches the final status: a credit for a
    /// completed deposit, a refund for a failed or cancelled withdrawal.
    #[test]
    fn prop_at_most_one_balance_effect_per_entry(
        kind in kind_strategy(),
        amount in amount_strategy(),
        events in prop::collection::vec(event_strategy(), 1..12),
    ) {
        let mut entry = entry_with(kind, EntryStatus::Pending, amount);
        let mut effects = Vec::new();

        for event in &events {
            match apply_transition(&entry, event, Utc::now()) {
                Ok(outcome) => {
                    if outcome.effect != BalanceEffect::None {
                        effects.push(outcome.effect);
                    }
                    entry = outcome.entry;
                }
                Err(_) => {
                    // Invalid events and terminal absorption leave the
                    // entry untouched, as the persistence CAS would.
                }
            }
        }

        prop_assert!(effects.len() <= 1, "effects: {effects:?}");

        if let Some(effect) = effects.first() {
            match effect {
                BalanceEffect::Credit(credited) => {
                    prop_assert_eq!(kind, EntryKind::Deposit);
                    prop_assert_eq!(entry.status, EntryStatus::Completed);
                    prop_assert_eq!(*credited, amount);
                }
                BalanceEffect::Refund(refunded) => {
                    prop_assert_eq!(kind, EntryKind::Withdrawal);
                    prop_assert!(matches!(
                        entry.status,
                        EntryStatus::Failed | EntryStatus::Cancelled
                    ));
                    prop_assert_eq!(*refunded, amount);
                }
                BalanceEffect::None => unreachable!(),
            }
        }
    }

    /// A deposit entry never produces a balance effect before `completed`,
    /// and a withdrawal never produces a credit.
    #[test]
    fn prop_effect_kind_matches_entry_kind(
        kind in kind_strategy(),
        amount in amount_strategy(),
        status in status_strategy(),
        event in event_strategy(),
    ) {
        let entry = entry_with(kind, status, amount);
        if let Ok(outcome) = apply_transition(&entry, &event, Utc::now()) {
            match (kind, outcome.effect) {
                (EntryKind::Deposit, BalanceEffect::Credit(_)) => {
                    prop_assert_eq!(outcome.entry.status, EntryStatus::Completed);
                }
                (EntryKind::Deposit, BalanceEffect::Refund(_)) => {
                    prop_assert!(false, "deposit produced a refund");
                }
                (EntryKind::Withdrawal, BalanceEffect::Credit(_)) => {
                    prop_assert!(false, "withdrawal produced a credit");
                }
                _ => {}
            }
        }
    }

    /// The ambiguity retry is bounded: from `processing`, repeated
    /// `PollAmbiguous` events reach `failed` in at most `max_retries`
    /// steps.
    #[test]
    fn prop_ambiguity_retry_is_bounded(
        kind in kind_strategy(),
        amount in amount_strategy(),
        max_retries in 1u32..8,
    ) {
        let mut entry = entry_with(kind, EntryStatus::Processing, amount);
        entry.max_retries = max_retries;

        let mut steps = 0u32;
        while entry.status == EntryStatus::Processing {
            let outcome = apply_transition(&entry, &TransitionEvent::PollAmbiguous, Utc::now())
                .expect("poll applies to processing");
            entry = outcome.entry;
            steps += 1;
            prop_assert!(steps <= max_retries, "retry loop exceeded bound");
        }

        prop_assert_eq!(entry.status, EntryStatus::Failed);
        prop_assert_eq!(steps, max_retries);
    }
}
