//! Shared test fixtures: an in-memory ledger store with the same
//! compare-and-set semantics as the database repository, and a mockable
//! provider client.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use rust_decimal::Decimal;
use uuid::Uuid;

use kavera_core::ledger::{
    ApplyResult, EntryStatus, LedgerEntry, LedgerStore, PaymentLimits, StoreError,
    TransitionOutcome, Wallet,
};
use kavera_core::ledger::BalanceEffect;
use kavera_core::provider::{
    InitiateRequest, ProviderAcceptance, ProviderClient, ProviderError, ProviderStatus,
};
use kavera_settlement::ServiceConfig;
use kavera_shared::types::{Currency, LedgerEntryId, WalletId};

mock! {
    pub Provider {}

    #[async_trait]
    impl ProviderClient for Provider {
        async fn initiate(
            &self,
            request: &InitiateRequest,
        ) -> Result<ProviderAcceptance, ProviderError>;

        async fn query_status(
            &self,
            provider_request_id: &str,
        ) -> Result<ProviderStatus, ProviderError>;
    }
}

#[derive(Default)]
struct Inner {
    wallets: HashMap<Uuid, Wallet>,
    entries: HashMap<Uuid, LedgerEntry>,
}

/// In-memory [`LedgerStore`] with atomic conditional transitions.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
    /// Artificial delay applied to stale-entry selection, for overlap tests.
    pub list_delay: Option<std::time::Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a wallet and returns its id.
    pub fn add_wallet(
        &self,
        user_id: Uuid,
        balance: Decimal,
        destination: Option<&str>,
    ) -> WalletId {
        let wallet = Wallet {
            id: WalletId::new(),
            user_id,
            balance,
            currency: Currency::Ugx,
            destination_msisdn: destination.map(String::from),
            contact_email: None,
        };
        let id = wallet.id;
        self.inner
            .lock()
            .unwrap()
            .wallets
            .insert(id.into_inner(), wallet);
        id
    }

    /// Current balance of a wallet.
    pub fn balance(&self, wallet_id: WalletId) -> Decimal {
        self.inner.lock().unwrap().wallets[&wallet_id.into_inner()].balance
    }

    /// Current state of an entry.
    #[allow(dead_code)]
    pub fn entry(&self, entry_id: LedgerEntryId) -> LedgerEntry {
        self.inner.lock().unwrap().entries[&entry_id.into_inner()].clone()
    }

    /// Replaces a stored entry wholesale (to backdate timestamps).
    #[allow(dead_code)]
    pub fn put_entry(&self, entry: LedgerEntry) {
        self.inner
            .lock()
            .unwrap()
            .entries
            .insert(entry.id.into_inner(), entry);
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn create_deposit(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.wallets.contains_key(&entry.wallet_id.into_inner()) {
            return Err(StoreError::WalletNotFound);
        }
        inner.entries.insert(entry.id.into_inner(), entry.clone());
        Ok(())
    }

    async fn create_withdrawal_reserved(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let wallet = inner
            .wallets
            .get_mut(&entry.wallet_id.into_inner())
            .ok_or(StoreError::WalletNotFound)?;
        if wallet.balance < entry.amount {
            return Err(StoreError::InsufficientBalance);
        }
        wallet.balance -= entry.amount;
        inner.entries.insert(entry.id.into_inner(), entry.clone());
        Ok(())
    }

    async fn find_entry(&self, id: LedgerEntryId) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.inner.lock().unwrap().entries.get(&id.into_inner()).cloned())
    }

    async fn find_by_provider_reference(
        &self,
        provider_request_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .values()
            .find(|entry| entry.provider_request_id.as_deref() == Some(provider_request_id))
            .cloned())
    }

    async fn apply_outcome(
        &self,
        expected: EntryStatus,
        outcome: &TransitionOutcome,
    ) -> Result<ApplyResult, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let id = outcome.entry.id.into_inner();

        let Some(stored) = inner.entries.get(&id) else {
            return Err(StoreError::Database("entry missing".to_string()));
        };
        if stored.status != expected {
            return Ok(ApplyResult::StaleStatus);
        }

        inner.entries.insert(id, outcome.entry.clone());

        match outcome.effect {
            BalanceEffect::None => {}
            BalanceEffect::Credit(amount) | BalanceEffect::Refund(amount) => {
                let wallet = inner
                    .wallets
                    .get_mut(&outcome.entry.wallet_id.into_inner())
                    .ok_or(StoreError::WalletNotFound)?;
                wallet.balance += amount;
            }
        }

        Ok(ApplyResult::Applied)
    }

    async fn count_open_entries(&self, wallet_id: WalletId) -> Result<u64, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|entry| entry.wallet_id == wallet_id && entry.status.is_open())
            .count() as u64)
    }

    async fn list_stale_open(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }
        let mut stale: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|entry| entry.status.is_open() && entry.created_at < cutoff)
            .cloned()
            .collect();
        stale.sort_by_key(|entry| entry.created_at);
        Ok(stale)
    }

    async fn list_failed_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|entry| {
                entry.status == EntryStatus::Failed
                    && entry.failed_at.is_some_and(|at| at < cutoff)
            })
            .cloned()
            .collect())
    }

    async fn list_entries(
        &self,
        wallet_id: WalletId,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<LedgerEntry>, u64), StoreError> {
        let mut entries: Vec<_> = self
            .inner
            .lock()
            .unwrap()
            .entries
            .values()
            .filter(|entry| entry.wallet_id == wallet_id)
            .cloned()
            .collect();
        entries.sort_by_key(|entry| std::cmp::Reverse(entry.created_at));
        let total = entries.len() as u64;
        let page = entries
            .into_iter()
            .skip(usize::try_from(offset).unwrap_or(usize::MAX))
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .collect();
        Ok((page, total))
    }

    async fn find_wallet_by_user(&self, user_id: Uuid) -> Result<Option<Wallet>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .wallets
            .values()
            .find(|wallet| wallet.user_id == user_id)
            .cloned())
    }

    async fn find_wallet(&self, wallet_id: WalletId) -> Result<Option<Wallet>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .wallets
            .get(&wallet_id.into_inner())
            .cloned())
    }
}

/// Limits generous enough for the happy paths.
#[allow(dead_code)]
pub fn test_limits() -> PaymentLimits {
    PaymentLimits {
        min_amount: Decimal::from(100),
        max_amount: Decimal::from(10_000_000),
        max_pending_entries: 3,
        max_withdrawal_amount: Decimal::from(2_000_000),
    }
}

/// Standard service config for tests.
pub fn test_config() -> ServiceConfig {
    ServiceConfig {
        currency: Currency::Ugx,
        limits: test_limits(),
        max_retries: 3,
    }
}
