//! Reconciliation sweeper.
//!
//! Two periodic, single-flight loops guarantee no ledger entry is stuck
//! forever:
//! - the reconcile sweep polls stale open entries and settles them through
//!   the same path the webhook uses
//! - the daily retention sweep rewrites old failed entries to `cancelled`
//!
//! Overlap is prevented with a run-in-progress flag per sweep; a tick that
//! finds the previous run still in flight is skipped and logged.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use kavera_core::ledger::{EntryStatus, LedgerStore, SettlementError};
use kavera_shared::config::SweeperConfig;

use crate::service::{PaymentService, SettleOutcome};

/// Seconds between retention sweep runs.
const RETENTION_SWEEP_INTERVAL_SECS: u64 = 86_400;

/// Counters from one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries selected for this run.
    pub examined: usize,
    /// Entries that reached a terminal state.
    pub settled: usize,
    /// Entries still open after the run (inside grace, or retried).
    pub still_open: usize,
    /// Entries whose reconciliation errored; picked up again next run.
    pub errors: usize,
}

/// Periodic reconciliation task.
pub struct Sweeper {
    service: Arc<PaymentService>,
    config: SweeperConfig,
    reconcile_running: AtomicBool,
    retention_running: AtomicBool,
}

impl Sweeper {
    /// Creates a new sweeper.
    #[must_use]
    pub fn new(service: Arc<PaymentService>, config: SweeperConfig) -> Self {
        Self {
            service,
            config,
            reconcile_running: AtomicBool::new(false),
            retention_running: AtomicBool::new(false),
        }
    }

    /// Spawns both sweep loops onto the runtime. The handles run until the
    /// process exits.
    #[must_use]
    pub fn spawn(self: Arc<Self>) -> (JoinHandle<()>, JoinHandle<()>) {
        let reconcile = {
            let sweeper = Arc::clone(&self);
            tokio::spawn(async move {
                let mut ticker =
                    tokio::time::interval(std::time::Duration::from_secs(sweeper.config.interval_secs));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Err(e) = sweeper.run_reconcile_once().await {
                        error!(error = %e, "reconcile sweep failed");
                    }
                }
            })
        };

        let retention = {
            let sweeper = Arc::clone(&self);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
                    RETENTION_SWEEP_INTERVAL_SECS,
                ));
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    ticker.tick().await;
                    if let Err(e) = sweeper.run_retention_once().await {
                        error!(error = %e, "retention sweep failed");
                    }
                }
            })
        };

        (reconcile, retention)
    }

    /// Runs one reconcile sweep. Returns `None` when the previous run was
    /// still in flight and this one was skipped.
    ///
    /// # Errors
    ///
    /// Returns an error when the stale-entry selection fails; per-entry
    /// errors are counted and retried on the next run.
    pub async fn run_reconcile_once(&self) -> Result<Option<SweepStats>, SettlementError> {
        if self.reconcile_running.swap(true, Ordering::SeqCst) {
            warn!("previous reconcile sweep still running, skipping this tick");
            return Ok(None);
        }

        let result = self.reconcile_inner().await;
        self.reconcile_running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    async fn reconcile_inner(&self) -> Result<SweepStats, SettlementError> {
        let cutoff =
            Utc::now() - Duration::seconds(i64::try_from(self.config.stale_threshold_secs).unwrap_or(i64::MAX));
        let no_ref_grace =
            Duration::seconds(i64::try_from(self.config.no_ref_grace_secs).unwrap_or(i64::MAX));

        let stale = self
            .service
            .store()
            .list_stale_open(cutoff)
            .await
            .map_err(|e| SettlementError::Database(e.to_string()))?;

        let mut stats = SweepStats {
            examined: stale.len(),
            ..SweepStats::default()
        };

        for entry in &stale {
            match self.service.reconcile_entry(entry, no_ref_grace).await {
                Ok(outcome) => {
                    if outcome.entry().is_terminal()
                        || outcome.entry().status == EntryStatus::Failed
                    {
                        stats.settled += 1;
                    } else {
                        stats.still_open += 1;
                    }
                    if let SettleOutcome::NoOp(current) = outcome {
                        debug!(entry_id = %current.id, status = %current.status, "entry already settled");
                    }
                }
                Err(e) => {
                    stats.errors += 1;
                    warn!(entry_id = %entry.id, error = %e, "reconciliation failed, will retry next run");
                }
            }
        }

        info!(
            examined = stats.examined,
            settled = stats.settled,
            still_open = stats.still_open,
            errors = stats.errors,
            "reconcile sweep finished"
        );
        Ok(stats)
    }

    /// Runs one retention sweep, archiving failed entries older than the
    /// retention window. Returns `None` when skipped due to overlap.
    ///
    /// # Errors
    ///
    /// Returns an error when the selection fails.
    pub async fn run_retention_once(&self) -> Result<Option<SweepStats>, SettlementError> {
        if self.retention_running.swap(true, Ordering::SeqCst) {
            warn!("previous retention sweep still running, skipping this tick");
            return Ok(None);
        }

        let result = self.retention_inner().await;
        self.retention_running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    async fn retention_inner(&self) -> Result<SweepStats, SettlementError> {
        let cutoff = Utc::now() - Duration::days(i64::from(self.config.retention_days));

        let expired = self
            .service
            .store()
            .list_failed_before(cutoff)
            .await
            .map_err(|e| SettlementError::Database(e.to_string()))?;

        let mut stats = SweepStats {
            examined: expired.len(),
            ..SweepStats::default()
        };

        for entry in &expired {
            match self.service.archive_entry(entry).await {
                Ok(_) => stats.settled += 1,
                Err(e) => {
                    stats.errors += 1;
                    warn!(entry_id = %entry.id, error = %e, "archive failed, will retry next run");
                }
            }
        }

        info!(
            examined = stats.examined,
            archived = stats.settled,
            errors = stats.errors,
            "retention sweep finished"
        );
        Ok(stats)
    }
}
