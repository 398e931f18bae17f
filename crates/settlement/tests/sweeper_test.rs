//! Integration tests for the reconciliation sweeper.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use common::{InMemoryStore, MockProvider, test_config};
use kavera_core::ledger::{EntryStatus, SettlementError};
use kavera_core::provider::{ProviderAcceptance, ProviderError, ProviderStatus};
use kavera_settlement::{PaymentRequest, PaymentService, Sweeper};
use kavera_shared::config::SweeperConfig;

fn sweeper_config() -> SweeperConfig {
    SweeperConfig {
        interval_secs: 60,
        stale_threshold_secs: 0,
        no_ref_grace_secs: 0,
        max_retries: 3,
        retention_days: 7,
    }
}

fn request(amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        amount,
        description: None,
    }
}

#[tokio::test]
async fn test_sweep_settles_stale_entries() {
    let store = Arc::new(InMemoryStore::new());
    let user_a = Uuid::new_v4();
    let user_b = Uuid::new_v4();
    let wallet_a = store.add_wallet(user_a, Decimal::ZERO, Some("256700000001"));
    let wallet_b = store.add_wallet(user_b, dec!(1000), Some("256700000002"));

    let mut provider = MockProvider::new();
    provider.expect_initiate().returning(|request| {
        Ok(ProviderAcceptance {
            provider_request_id: format!("req-{}", request.correlation_id),
        })
    });
    // The deposit succeeded upstream; the withdrawal failed.
    provider.expect_query_status().returning(|reference: &str| {
        if reference.ends_with("dep") {
            Ok(ProviderStatus::Succeeded {
                confirmation_id: Some("conf-1".to_string()),
            })
        } else {
            Ok(ProviderStatus::Failed {
                reason: "payout expired".to_string(),
            })
        }
    });

    let service = Arc::new(PaymentService::new(
        Arc::clone(&store) as Arc<dyn kavera_core::ledger::LedgerStore>,
        Arc::new(provider),
        None,
        test_config(),
    ));

    let deposit = service.deposit(user_a, request(dec!(500))).await.unwrap();
    let withdrawal = service.withdraw(user_b, request(dec!(400))).await.unwrap();

    // Rewrite provider references so the mock can tell them apart, and
    // backdate creation so both entries are stale.
    let mut dep = store.entry(deposit.id);
    dep.provider_request_id = Some("req-dep".to_string());
    dep.created_at = Utc::now() - Duration::hours(2);
    store.put_entry(dep);

    let mut wdr = store.entry(withdrawal.entry.id);
    wdr.provider_request_id = Some("req-wdr".to_string());
    wdr.created_at = Utc::now() - Duration::hours(2);
    store.put_entry(wdr);

    let sweeper = Sweeper::new(Arc::clone(&service), sweeper_config());
    let stats = sweeper.run_reconcile_once().await.unwrap().unwrap();

    assert_eq!(stats.examined, 2);
    assert_eq!(stats.settled, 2);
    assert_eq!(stats.errors, 0);

    assert_eq!(store.entry(deposit.id).status, EntryStatus::Completed);
    assert_eq!(store.balance(wallet_a), dec!(500));

    assert_eq!(store.entry(withdrawal.entry.id).status, EntryStatus::Failed);
    assert_eq!(store.balance(wallet_b), dec!(1000));
}

#[tokio::test]
async fn test_sweep_fails_entries_with_no_reference_past_grace() {
    let store = Arc::new(InMemoryStore::new());
    let user = Uuid::new_v4();
    let wallet = store.add_wallet(user, Decimal::ZERO, Some("256700000001"));

    let mut provider = MockProvider::new();
    provider.expect_initiate().returning(|_| {
        Err(ProviderError::Unreachable {
            reason: "timeout".to_string(),
        })
    });

    let service = Arc::new(PaymentService::new(
        Arc::clone(&store) as Arc<dyn kavera_core::ledger::LedgerStore>,
        Arc::new(provider),
        None,
        test_config(),
    ));

    let entry = service.deposit(user, request(dec!(500))).await.unwrap();
    assert!(entry.provider_request_id.is_none());

    let mut stored = store.entry(entry.id);
    stored.created_at = Utc::now() - Duration::minutes(10);
    store.put_entry(stored);

    let sweeper = Sweeper::new(Arc::clone(&service), sweeper_config());
    let stats = sweeper.run_reconcile_once().await.unwrap().unwrap();

    assert_eq!(stats.examined, 1);
    assert_eq!(stats.settled, 1);
    assert_eq!(store.entry(entry.id).status, EntryStatus::Failed);
    assert_eq!(store.balance(wallet), dec!(0));
}

#[tokio::test]
async fn test_retention_sweep_archives_old_failures_only() {
    let store = Arc::new(InMemoryStore::new());
    let user = Uuid::new_v4();
    store.add_wallet(user, Decimal::ZERO, Some("256700000001"));

    let mut provider = MockProvider::new();
    provider.expect_initiate().returning(|_| {
        Err(ProviderError::Rejected {
            reason: "declined".to_string(),
        })
    });

    let service = Arc::new(PaymentService::new(
        Arc::clone(&store) as Arc<dyn kavera_core::ledger::LedgerStore>,
        Arc::new(provider),
        None,
        test_config(),
    ));

    // Both deposits fail synchronously; one failure is backdated past the
    // retention window.
    let old = service.deposit(user, request(dec!(500))).await.unwrap();
    let recent = service.deposit(user, request(dec!(500))).await.unwrap();
    assert_eq!(old.status, EntryStatus::Failed);

    let mut stored = store.entry(old.id);
    stored.failed_at = Some(Utc::now() - Duration::days(8));
    store.put_entry(stored);

    let sweeper = Sweeper::new(Arc::clone(&service), sweeper_config());
    let stats = sweeper.run_retention_once().await.unwrap().unwrap();

    assert_eq!(stats.examined, 1);
    assert_eq!(stats.settled, 1);
    assert_eq!(store.entry(old.id).status, EntryStatus::Cancelled);
    assert_eq!(store.entry(recent.id).status, EntryStatus::Failed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_overlapping_reconcile_run_is_skipped() {
    let mut store = InMemoryStore::new();
    store.list_delay = Some(std::time::Duration::from_millis(200));
    let store = Arc::new(store);

    let service = Arc::new(PaymentService::new(
        Arc::clone(&store) as Arc<dyn kavera_core::ledger::LedgerStore>,
        Arc::new(MockProvider::new()),
        None,
        test_config(),
    ));

    let sweeper = Arc::new(Sweeper::new(Arc::clone(&service), sweeper_config()));

    let first = {
        let sweeper = Arc::clone(&sweeper);
        tokio::spawn(async move { sweeper.run_reconcile_once().await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // The second tick finds the first run still in flight and is skipped.
    let second = sweeper.run_reconcile_once().await.unwrap();
    assert!(second.is_none());

    let first: Result<Option<_>, SettlementError> = first.await.unwrap();
    assert!(first.unwrap().is_some());
}
