//! Payment orchestration.
//!
//! `PaymentService` is the only code that moves ledger entries: request
//! handlers, webhook deliveries, and sweeper polls all come through here,
//! and every status write goes through [`settle`](PaymentService::settle) -
//! one idempotent path built on the pure transition function plus the
//! store's compare-and-set.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use kavera_core::ledger::{
    ApplyResult, EntryKind, EntryStatus, LedgerEntry, LedgerStore, PaymentLimits, SettlementError,
    StoreError, TransitionError, TransitionEvent, Wallet, apply_transition, validation,
};
use kavera_core::provider::{
    InitiateRequest, ProviderClient, ProviderError, ProviderStatus,
};
use kavera_shared::NotificationService;
use kavera_shared::types::{Currency, LedgerEntryId, Money};

/// Service-level configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Currency sent to the provider.
    pub currency: Currency,
    /// Request limits.
    pub limits: PaymentLimits,
    /// Ambiguous reconciliation attempts allowed per entry.
    pub max_retries: u32,
}

/// A deposit or withdrawal request, already authenticated.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    /// Amount in the smallest currency unit.
    pub amount: Decimal,
    /// Caller-supplied description.
    pub description: Option<String>,
}

/// Result of a withdrawal request: the entry plus the balance after the
/// reservation.
#[derive(Debug, Clone)]
pub struct WithdrawalReceipt {
    /// The created entry.
    pub entry: LedgerEntry,
    /// Wallet balance after the reservation was taken.
    pub new_balance: Decimal,
}

/// Result of pushing an entry through the settle path.
#[derive(Debug, Clone)]
pub enum SettleOutcome {
    /// The transition was applied; the entry is in its new state.
    Applied(LedgerEntry),
    /// A concurrent path had already finalized the entry; nothing was
    /// written. Carries the current state.
    NoOp(LedgerEntry),
}

impl SettleOutcome {
    /// The entry in its latest observed state.
    #[must_use]
    pub fn entry(&self) -> &LedgerEntry {
        match self {
            Self::Applied(entry) | Self::NoOp(entry) => entry,
        }
    }

    /// Returns true if this path performed the write.
    #[must_use]
    pub const fn was_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// Payment orchestration service.
pub struct PaymentService {
    store: Arc<dyn LedgerStore>,
    provider: Arc<dyn ProviderClient>,
    notifier: Option<Arc<NotificationService>>,
    config: ServiceConfig,
}

impl PaymentService {
    /// Creates a new payment service.
    #[must_use]
    pub fn new(
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn ProviderClient>,
        notifier: Option<Arc<NotificationService>>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            provider,
            notifier,
            config,
        }
    }

    /// Access to the store, for the sweeper's selection queries.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    // ========================================================================
    // Request entry points
    // ========================================================================

    /// Creates a deposit: validates, persists the `pending` entry, then
    /// asks the provider to collect.
    ///
    /// A synchronous provider rejection is returned as a `failed` entry; an
    /// unreachable provider leaves the entry `pending` for the sweeper.
    /// Neither is an error to the caller.
    ///
    /// # Errors
    ///
    /// Returns a validation error before any entry exists.
    pub async fn deposit(
        &self,
        user_id: Uuid,
        request: PaymentRequest,
    ) -> Result<LedgerEntry, SettlementError> {
        let wallet = self.wallet_for(user_id).await?;
        let destination = self.validated_request(&wallet, &request)?;
        self.check_open_entry_limit(&wallet).await?;

        let entry = LedgerEntry::new(
            wallet.id,
            EntryKind::Deposit,
            request.amount,
            destination,
            request.description,
            self.config.max_retries,
            Utc::now(),
        );
        self.store
            .create_deposit(&entry)
            .await
            .map_err(store_to_settlement)?;

        info!(entry_id = %entry.id, amount = %entry.amount, "deposit created");
        self.initiate_created(entry).await
    }

    /// Creates a withdrawal: validates, reserves the amount and persists
    /// the `pending` entry in one storage transaction, then asks the
    /// provider to pay out.
    ///
    /// # Errors
    ///
    /// Returns a validation error (including `InsufficientBalance` and
    /// `OverUserLimit`) before any entry exists.
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        request: PaymentRequest,
    ) -> Result<WithdrawalReceipt, SettlementError> {
        let wallet = self.wallet_for(user_id).await?;
        let destination = self.validated_request(&wallet, &request)?;
        validation::validate_withdrawal(request.amount, wallet.balance, &self.config.limits)?;
        self.check_open_entry_limit(&wallet).await?;

        let entry = LedgerEntry::new(
            wallet.id,
            EntryKind::Withdrawal,
            request.amount,
            destination,
            request.description,
            self.config.max_retries,
            Utc::now(),
        );
        self.store
            .create_withdrawal_reserved(&entry)
            .await
            .map_err(|e| match e {
                StoreError::InsufficientBalance => SettlementError::InsufficientBalance {
                    requested: entry.amount,
                    available: wallet.balance,
                },
                other => store_to_settlement(other),
            })?;

        info!(entry_id = %entry.id, amount = %entry.amount, "withdrawal created, amount reserved");
        let entry = self.initiate_created(entry).await?;

        let new_balance = self
            .store
            .find_wallet(entry.wallet_id)
            .await
            .map_err(store_to_settlement)?
            .map_or(Decimal::ZERO, |w| w.balance);

        Ok(WithdrawalReceipt { entry, new_balance })
    }

    /// Returns an entry for its owner, polling the provider on demand when
    /// the entry is still open and carries a provider reference.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` when the entry does not exist or belongs to
    /// another user.
    pub async fn entry_status(
        &self,
        user_id: Uuid,
        entry_id: LedgerEntryId,
    ) -> Result<LedgerEntry, SettlementError> {
        let entry = self.owned_entry(user_id, entry_id).await?;

        let Some(reference) = entry.provider_request_id.clone() else {
            return Ok(entry);
        };
        if entry.is_terminal() {
            return Ok(entry);
        }

        // On-demand poll: settle definitive answers through the normal
        // path; anything else leaves the entry for the sweeper.
        match self.provider.query_status(&reference).await {
            Ok(ProviderStatus::Succeeded { confirmation_id }) => Ok(self
                .settle(&entry, &TransitionEvent::ConfirmationSucceeded { confirmation_id })
                .await?
                .entry()
                .clone()),
            Ok(ProviderStatus::Failed { reason }) => Ok(self
                .settle(&entry, &TransitionEvent::ConfirmationFailed { reason })
                .await?
                .entry()
                .clone()),
            Ok(ProviderStatus::InFlight) => Ok(entry),
            Err(e) => {
                debug!(entry_id = %entry.id, error = %e, "on-demand poll failed");
                Ok(entry)
            }
        }
    }

    /// Lists a user's entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `WalletNotFound` when the user has no wallet.
    pub async fn list_entries(
        &self,
        user_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<LedgerEntry>, u64), SettlementError> {
        let wallet = self.wallet_for(user_id).await?;
        self.store
            .list_entries(wallet.id, offset, limit)
            .await
            .map_err(store_to_settlement)
    }

    /// Returns a user's wallet.
    ///
    /// # Errors
    ///
    /// Returns `WalletNotFound` when the user has no wallet.
    pub async fn wallet_for(&self, user_id: Uuid) -> Result<Wallet, SettlementError> {
        self.store
            .find_wallet_by_user(user_id)
            .await
            .map_err(store_to_settlement)?
            .ok_or(SettlementError::WalletNotFound(user_id))
    }

    /// Cancels an open entry on behalf of its owner.
    ///
    /// If a confirmation races the cancellation, whichever compare-and-set
    /// wins determines the outcome; the loser surfaces `NotCancellable`.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` or `NotCancellable`.
    pub async fn cancel(
        &self,
        user_id: Uuid,
        entry_id: LedgerEntryId,
    ) -> Result<LedgerEntry, SettlementError> {
        let entry = self.owned_entry(user_id, entry_id).await?;

        if !entry.status.is_cancellable() {
            return Err(SettlementError::NotCancellable);
        }

        match self.settle(&entry, &TransitionEvent::Cancelled).await? {
            SettleOutcome::Applied(entry) => Ok(entry),
            SettleOutcome::NoOp(_) => Err(SettlementError::NotCancellable),
        }
    }

    // ========================================================================
    // Confirmation paths
    // ========================================================================

    /// Applies a provider-reported status delivered by webhook.
    ///
    /// Duplicate deliveries and race losers resolve to a no-op; the caller
    /// acknowledges the delivery either way.
    ///
    /// # Errors
    ///
    /// Returns `UnknownReference` when no entry carries the reference.
    pub async fn handle_confirmation(
        &self,
        provider_request_id: &str,
        status: ProviderStatus,
    ) -> Result<SettleOutcome, SettlementError> {
        let entry = self
            .store
            .find_by_provider_reference(provider_request_id)
            .await
            .map_err(store_to_settlement)?
            .ok_or_else(|| SettlementError::UnknownReference(provider_request_id.to_string()))?;

        let event = match status {
            // A pushed "still pending" notice carries no new information.
            ProviderStatus::InFlight => return Ok(SettleOutcome::NoOp(entry)),
            ProviderStatus::Succeeded { confirmation_id } => {
                TransitionEvent::ConfirmationSucceeded { confirmation_id }
            }
            ProviderStatus::Failed { reason } => TransitionEvent::ConfirmationFailed { reason },
        };

        self.settle(&entry, &event).await
    }

    /// Resolves one stale entry on behalf of the sweeper.
    ///
    /// Entries without a provider reference are failed once the grace
    /// period has passed; entries with one are polled, and an ambiguous
    /// answer consumes one bounded retry.
    ///
    /// # Errors
    ///
    /// Returns storage errors; provider errors are absorbed into the
    /// bounded retry.
    pub async fn reconcile_entry(
        &self,
        entry: &LedgerEntry,
        no_ref_grace: Duration,
    ) -> Result<SettleOutcome, SettlementError> {
        let Some(reference) = entry.provider_request_id.clone() else {
            if entry.age(Utc::now()) > no_ref_grace {
                return self.settle(entry, &TransitionEvent::NoProviderReference).await;
            }
            debug!(entry_id = %entry.id, "no provider reference yet, inside grace period");
            return Ok(SettleOutcome::NoOp(entry.clone()));
        };

        let event = match self.provider.query_status(&reference).await {
            Ok(ProviderStatus::Succeeded { confirmation_id }) => {
                TransitionEvent::ConfirmationSucceeded { confirmation_id }
            }
            Ok(ProviderStatus::Failed { reason }) => TransitionEvent::ConfirmationFailed { reason },
            Ok(ProviderStatus::InFlight) => TransitionEvent::PollAmbiguous,
            Err(e) => {
                debug!(entry_id = %entry.id, error = %e, "status poll failed, counting a retry");
                TransitionEvent::PollAmbiguous
            }
        };

        self.settle(entry, &event).await
    }

    /// Archives one failed entry on behalf of the retention sweep.
    ///
    /// # Errors
    ///
    /// Returns storage errors.
    pub async fn archive_entry(
        &self,
        entry: &LedgerEntry,
    ) -> Result<SettleOutcome, SettlementError> {
        self.settle(entry, &TransitionEvent::Archived).await
    }

    // ========================================================================
    // The settle path
    // ========================================================================

    /// The single idempotent transition path.
    ///
    /// Computes the pure transition, persists it with a compare-and-set on
    /// the status it was computed from, and reports a no-op when a
    /// concurrent path already finalized the entry.
    async fn settle(
        &self,
        entry: &LedgerEntry,
        event: &TransitionEvent,
    ) -> Result<SettleOutcome, SettlementError> {
        let outcome = match apply_transition(entry, event, Utc::now()) {
            Ok(outcome) => outcome,
            Err(TransitionError::AlreadyTerminal { status }) => {
                debug!(entry_id = %entry.id, %status, event = event.name(), "event for terminal entry ignored");
                return Ok(SettleOutcome::NoOp(entry.clone()));
            }
            Err(e @ TransitionError::InvalidTransition { .. }) => {
                warn!(entry_id = %entry.id, error = %e, "rejected transition");
                return Err(SettlementError::Internal(e.to_string()));
            }
        };

        match self
            .store
            .apply_outcome(entry.status, &outcome)
            .await
            .map_err(store_to_settlement)?
        {
            ApplyResult::Applied => {
                info!(
                    entry_id = %outcome.entry.id,
                    from = %entry.status,
                    to = %outcome.entry.status,
                    event = event.name(),
                    "transition applied"
                );
                self.notify_if_terminal(&outcome.entry);
                Ok(SettleOutcome::Applied(outcome.entry))
            }
            ApplyResult::StaleStatus => {
                // The race loser re-reads and reports what actually
                // happened; it must not mutate anything.
                let current = self
                    .store
                    .find_entry(entry.id)
                    .await
                    .map_err(store_to_settlement)?
                    .ok_or(SettlementError::EntryNotFound(entry.id.into_inner()))?;
                debug!(entry_id = %entry.id, status = %current.status, "transition lost the race");
                Ok(SettleOutcome::NoOp(current))
            }
        }
    }

    /// After persisting the `pending` entry, hands it to the provider and
    /// applies the acceptance or rejection.
    async fn initiate_created(&self, entry: LedgerEntry) -> Result<LedgerEntry, SettlementError> {
        let request = InitiateRequest {
            kind: entry.kind,
            amount: entry.amount,
            currency: self.config.currency,
            destination: entry.destination.clone(),
            correlation_id: entry.id,
            narration: entry.description.clone(),
        };

        match self.provider.initiate(&request).await {
            Ok(acceptance) => {
                // The entry must be in `processing` with its reference
                // before this call returns: confirmations may arrive for
                // it immediately.
                let outcome = self
                    .settle(
                        &entry,
                        &TransitionEvent::GatewayAccepted {
                            provider_request_id: acceptance.provider_request_id,
                        },
                    )
                    .await?;
                Ok(outcome.entry().clone())
            }
            Err(ProviderError::Rejected { reason }) => {
                warn!(entry_id = %entry.id, %reason, "provider rejected request");
                let outcome = self
                    .settle(&entry, &TransitionEvent::GatewayRejected { reason })
                    .await?;
                Ok(outcome.entry().clone())
            }
            Err(e) => {
                // Ambiguous: the request may have reached the provider.
                // The entry stays pending and the sweeper resolves it.
                warn!(entry_id = %entry.id, error = %e, "initiate ambiguous, leaving entry pending");
                Ok(entry)
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Validation shared by deposits and withdrawals. Returns the payout
    /// destination on file.
    fn validated_request(
        &self,
        wallet: &Wallet,
        request: &PaymentRequest,
    ) -> Result<String, SettlementError> {
        validation::validate_amount(request.amount, &self.config.limits)?;

        let destination = wallet
            .destination_msisdn
            .clone()
            .ok_or(SettlementError::NoDestinationOnFile)?;
        validation::validate_destination(&destination)?;

        Ok(destination)
    }

    /// Rejects the request when the user is at the open-entry limit.
    async fn check_open_entry_limit(&self, wallet: &Wallet) -> Result<(), SettlementError> {
        let open = self
            .store
            .count_open_entries(wallet.id)
            .await
            .map_err(store_to_settlement)?;
        validation::check_open_entries(open, &self.config.limits)
    }

    /// Loads an entry and checks it belongs to `user_id`'s wallet.
    async fn owned_entry(
        &self,
        user_id: Uuid,
        entry_id: LedgerEntryId,
    ) -> Result<LedgerEntry, SettlementError> {
        let wallet = self.wallet_for(user_id).await?;
        let entry = self
            .store
            .find_entry(entry_id)
            .await
            .map_err(store_to_settlement)?
            .ok_or(SettlementError::EntryNotFound(entry_id.into_inner()))?;

        // Entries of other users read as not-found.
        if entry.wallet_id != wallet.id {
            return Err(SettlementError::EntryNotFound(entry_id.into_inner()));
        }
        Ok(entry)
    }

    /// Fire-and-forget outcome notification. Never blocks or fails the
    /// transition that triggered it.
    fn notify_if_terminal(&self, entry: &LedgerEntry) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        if !matches!(entry.status, EntryStatus::Completed | EntryStatus::Failed) {
            return;
        }

        let store = Arc::clone(&self.store);
        let entry = entry.clone();
        tokio::spawn(async move {
            let wallet = match store.find_wallet(entry.wallet_id).await {
                Ok(Some(wallet)) => wallet,
                Ok(None) => return,
                Err(e) => {
                    warn!(entry_id = %entry.id, error = %e, "wallet lookup for notification failed");
                    return;
                }
            };
            let Some(email) = wallet.contact_email else {
                return;
            };

            let amount = Money::new(entry.amount, wallet.currency).to_string();
            let kind = entry.kind.to_string();
            let result = match entry.status {
                EntryStatus::Completed => {
                    notifier.send_payment_completed(&email, &kind, &amount).await
                }
                _ => {
                    let reason = entry
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "unknown".to_string());
                    notifier
                        .send_payment_failed(&email, &kind, &amount, &reason)
                        .await
                }
            };
            if let Err(e) = result {
                warn!(entry_id = %entry.id, error = %e, "outcome notification failed");
            }
        });
    }
}

fn store_to_settlement(error: StoreError) -> SettlementError {
    match error {
        StoreError::InsufficientBalance => SettlementError::Internal(
            "reservation failed after validation".to_string(),
        ),
        StoreError::WalletNotFound => SettlementError::Internal("wallet vanished".to_string()),
        StoreError::DuplicateProviderReference(reference) => {
            SettlementError::Database(format!("duplicate provider reference: {reference}"))
        }
        StoreError::Database(message) => SettlementError::Database(message),
    }
}
