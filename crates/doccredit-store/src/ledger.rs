//! Ledger logic over a key/value backend.

use chrono::{DateTime, Utc};
use doccredit_core::{
    evaluate, ConsumeOutcome, ConsumptionRecord, CreditBalance, DenialReason, Entitlement,
    LedgerMutation, MutationEffect, PurchasedDocument, Resource, Subscription, SubscriptionId,
    SubscriptionStatus, Transaction, TransactionId, UserId,
};
use tracing::{debug, info};

use crate::backend::{Backend, Batch};
use crate::error::{Result, StoreError};
use crate::keys;
use crate::locks::StripedLocks;
use crate::memory::MemoryBackend;
use crate::schema::cf;
use crate::Store;

/// `Store` implementation shared by every backend.
pub struct LedgerStore<B> {
    backend: B,
    user_locks: StripedLocks,
    session_locks: StripedLocks,
}

/// In-memory ledger.
pub type MemoryStore = LedgerStore<MemoryBackend>;

/// RocksDB-backed ledger.
#[cfg(feature = "rocksdb-backend")]
pub type RocksStore = LedgerStore<crate::rocks::RocksBackend>;

#[cfg(feature = "rocksdb-backend")]
impl LedgerStore<crate::rocks::RocksBackend> {
    /// Open or create a `RocksDB` ledger at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self::with_backend(crate::rocks::RocksBackend::open(path)?))
    }
}

impl MemoryStore {
    /// Create an empty in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend(MemoryBackend::new())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> LedgerStore<B> {
    /// Wrap a backend.
    pub fn with_backend(backend: B) -> Self {
        Self {
            backend,
            user_locks: StripedLocks::default(),
            session_locks: StripedLocks::default(),
        }
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn read<T: serde::de::DeserializeOwned>(&self, family: &str, key: &[u8]) -> Result<Option<T>> {
        self.backend
            .get(family, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Ids stored after the user prefix of an index family, in key order.
    fn user_ids<T>(
        &self,
        family: &str,
        user_id: &UserId,
        from_bytes: fn([u8; 16]) -> T,
    ) -> Result<Vec<T>> {
        self.backend
            .scan_prefix(family, &keys::user_prefix(user_id))?
            .into_iter()
            .map(|(key, _)| keys::read_id_bytes(&key, 16).map(from_bytes))
            .collect()
    }

    // =========================================================================
    // Staging helpers. Callers hold the user lock.
    // =========================================================================

    fn stage_balance(batch: &mut Batch, balance: &CreditBalance) -> Result<()> {
        batch.put(
            cf::BALANCES,
            keys::balance_key(&balance.user_id),
            Self::serialize(balance)?,
        );
        Ok(())
    }

    fn stage_subscription(batch: &mut Batch, subscription: &Subscription) -> Result<()> {
        batch.put(
            cf::SUBSCRIPTIONS,
            keys::subscription_key(&subscription.id),
            Self::serialize(subscription)?,
        );
        Ok(())
    }

    fn stage_transaction(batch: &mut Batch, transaction: &Transaction) -> Result<()> {
        batch.put(
            cf::TRANSACTIONS,
            keys::transaction_key(&transaction.id),
            Self::serialize(transaction)?,
        );
        batch.put(
            cf::TRANSACTIONS_BY_USER,
            keys::user_transaction_key(&transaction.user_id, &transaction.id),
            Vec::new(),
        );
        batch.put(
            cf::PROVIDER_SESSIONS,
            keys::provider_key(&transaction.provider_session_id),
            keys::transaction_key(&transaction.id),
        );
        Ok(())
    }

    /// Stage an upsert and the supersession of the user's other active rows.
    fn stage_upsert(
        &self,
        batch: &mut Batch,
        incoming: &Subscription,
        now: DateTime<Utc>,
    ) -> Result<Subscription> {
        let existing = self.list_subscriptions_by_user(&incoming.user_id)?;

        let stored = match existing
            .iter()
            .find(|s| s.provider_subscription_id == incoming.provider_subscription_id)
        {
            Some(current) => Subscription {
                id: current.id,
                created_at: current.created_at,
                updated_at: now,
                ..incoming.clone()
            },
            None => {
                batch.put(
                    cf::SUBSCRIPTIONS_BY_USER,
                    keys::user_subscription_key(&incoming.user_id, &incoming.id),
                    Vec::new(),
                );
                batch.put(
                    cf::SUBSCRIPTIONS_BY_PROVIDER,
                    keys::provider_key(&incoming.provider_subscription_id),
                    keys::subscription_key(&incoming.id),
                );
                incoming.clone()
            }
        };

        for mut other in existing {
            if other.id != stored.id && other.status == SubscriptionStatus::Active {
                debug!(
                    user_id = %other.user_id,
                    superseded = %other.id,
                    by = %stored.id,
                    "Superseding active subscription"
                );
                other.cancel(now);
                Self::stage_subscription(batch, &other)?;
            }
        }

        Self::stage_subscription(batch, &stored)?;
        Ok(stored)
    }

    fn apply_mutation(
        &self,
        batch: &mut Batch,
        transaction: &Transaction,
        mutation: LedgerMutation,
        now: DateTime<Utc>,
    ) -> Result<MutationEffect> {
        match mutation {
            LedgerMutation::GrantCredits { credits } => {
                if credits == 0 {
                    return Err(StoreError::InvalidAmount(0));
                }
                let mut balance = self.get_balance(&transaction.user_id)?;
                let new_balance = balance.credit(credits, now);
                Self::stage_balance(batch, &balance)?;
                Ok(MutationEffect::CreditsGranted {
                    balance: new_balance,
                })
            }
            LedgerMutation::ActivateSubscription(subscription) => {
                let stored = self.stage_upsert(batch, &subscription, now)?;
                Ok(MutationEffect::SubscriptionActivated(stored))
            }
            LedgerMutation::RenewSubscription {
                provider_subscription_id,
                documents_limit,
                period_start,
                period_end,
            } => {
                let mut subscription = self
                    .find_subscription_by_provider_id(&provider_subscription_id)?
                    .ok_or_else(|| StoreError::NotFound {
                        entity: "subscription",
                        id: provider_subscription_id.clone(),
                    })?;

                if let Err(reason) = subscription.check_renewal(period_end) {
                    return Ok(MutationEffect::RenewalSkipped {
                        subscription,
                        reason,
                    });
                }

                subscription.renew(documents_limit, period_start, period_end, now);
                Self::stage_subscription(batch, &subscription)?;
                Ok(MutationEffect::SubscriptionRenewed(subscription))
            }
            LedgerMutation::RecordDocument(document) => {
                batch.put(
                    cf::PURCHASED_DOCUMENTS,
                    keys::purchased_document_key(&document.user_id, &document.id),
                    Self::serialize(&document)?,
                );
                Ok(MutationEffect::DocumentRecorded(document))
            }
            LedgerMutation::AuditOnly => Ok(MutationEffect::Recorded),
        }
    }

    /// Debit `resource` by one unit. Returns what is left in that pool.
    fn stage_debit(
        &self,
        batch: &mut Batch,
        user_id: &UserId,
        resource: Resource,
        subscriptions: Vec<Subscription>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        match resource {
            Resource::Subscription { subscription_id } => {
                let mut subscription = subscriptions
                    .into_iter()
                    .find(|s| s.id == subscription_id)
                    .ok_or_else(|| StoreError::NotFound {
                        entity: "subscription",
                        id: subscription_id.to_string(),
                    })?;
                subscription.documents_remaining = subscription
                    .documents_remaining
                    .checked_sub(1)
                    .ok_or(StoreError::InsufficientBalance {
                        available: 0,
                        required: 1,
                    })?;
                subscription.updated_at = now;
                Self::stage_subscription(batch, &subscription)?;
                Ok(u64::from(subscription.documents_remaining))
            }
            Resource::Credits => {
                let mut balance = self.get_balance(user_id)?;
                let available = balance.credits;
                let remaining = balance.debit(1, now).ok_or(StoreError::InsufficientBalance {
                    available,
                    required: 1,
                })?;
                Self::stage_balance(batch, &balance)?;
                Ok(remaining)
            }
        }
    }
}

impl<B: Backend> Store for LedgerStore<B> {
    // =========================================================================
    // Balances
    // =========================================================================

    fn get_balance(&self, user_id: &UserId) -> Result<CreditBalance> {
        Ok(self
            .read(cf::BALANCES, &keys::balance_key(user_id))?
            .unwrap_or_else(|| CreditBalance::empty(*user_id, Utc::now())))
    }

    fn increment_credits(&self, user_id: &UserId, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(StoreError::InvalidAmount(amount));
        }
        let _guard = self.user_locks.lock(user_id.as_bytes())?;

        let mut balance = self.get_balance(user_id)?;
        let new_balance = balance.credit(amount, Utc::now());

        let mut batch = Batch::default();
        Self::stage_balance(&mut batch, &balance)?;
        self.backend.write(batch)?;

        Ok(new_balance)
    }

    fn decrement_credits(&self, user_id: &UserId, amount: u64) -> Result<u64> {
        if amount == 0 {
            return Err(StoreError::InvalidAmount(amount));
        }
        let _guard = self.user_locks.lock(user_id.as_bytes())?;

        let mut balance = self.get_balance(user_id)?;
        let available = balance.credits;
        let new_balance = balance
            .debit(amount, Utc::now())
            .ok_or(StoreError::InsufficientBalance {
                available,
                required: amount,
            })?;

        let mut batch = Batch::default();
        Self::stage_balance(&mut batch, &balance)?;
        self.backend.write(batch)?;

        Ok(new_balance)
    }

    // =========================================================================
    // Subscriptions
    // =========================================================================

    fn get_active_subscription(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>> {
        let rows = self.list_subscriptions_by_user(user_id)?;
        Ok(Subscription::latest_active(&rows, now).cloned())
    }

    fn get_subscription(&self, subscription_id: &SubscriptionId) -> Result<Option<Subscription>> {
        self.read(cf::SUBSCRIPTIONS, &keys::subscription_key(subscription_id))
    }

    fn find_subscription_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>> {
        let Some(id_bytes) = self.backend.get(
            cf::SUBSCRIPTIONS_BY_PROVIDER,
            &keys::provider_key(provider_subscription_id),
        )?
        else {
            return Ok(None);
        };
        let id = SubscriptionId::from_bytes(keys::read_id_bytes(&id_bytes, 0)?);
        self.get_subscription(&id)
    }

    fn list_subscriptions_by_user(&self, user_id: &UserId) -> Result<Vec<Subscription>> {
        let mut ids = self.user_ids(
            cf::SUBSCRIPTIONS_BY_USER,
            user_id,
            SubscriptionId::from_bytes,
        )?;
        ids.reverse();

        let mut rows = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(subscription) = self.get_subscription(&id)? {
                rows.push(subscription);
            }
        }
        Ok(rows)
    }

    fn decrement_subscription_documents(
        &self,
        subscription_id: &SubscriptionId,
        amount: u32,
    ) -> Result<u32> {
        if amount == 0 {
            return Err(StoreError::InvalidAmount(0));
        }
        let not_found = || StoreError::NotFound {
            entity: "subscription",
            id: subscription_id.to_string(),
        };

        let owner = self.get_subscription(subscription_id)?.ok_or_else(not_found)?.user_id;
        let _guard = self.user_locks.lock(owner.as_bytes())?;

        // Re-read under the lock; a renewal may have landed in between.
        let mut subscription = self.get_subscription(subscription_id)?.ok_or_else(not_found)?;
        subscription.documents_remaining = subscription
            .documents_remaining
            .checked_sub(amount)
            .ok_or(StoreError::InsufficientBalance {
                available: u64::from(subscription.documents_remaining),
                required: u64::from(amount),
            })?;
        subscription.updated_at = Utc::now();

        let mut batch = Batch::default();
        Self::stage_subscription(&mut batch, &subscription)?;
        self.backend.write(batch)?;

        Ok(subscription.documents_remaining)
    }

    fn upsert_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        let _guard = self.user_locks.lock(subscription.user_id.as_bytes())?;

        let mut batch = Batch::default();
        let stored = self.stage_upsert(&mut batch, subscription, Utc::now())?;
        self.backend.write(batch)?;

        Ok(stored)
    }

    fn mark_subscription_canceled(
        &self,
        provider_subscription_id: &str,
        canceled_at: DateTime<Utc>,
    ) -> Result<Subscription> {
        let not_found = || StoreError::NotFound {
            entity: "subscription",
            id: provider_subscription_id.to_string(),
        };

        let owner = self
            .find_subscription_by_provider_id(provider_subscription_id)?
            .ok_or_else(not_found)?
            .user_id;
        let _guard = self.user_locks.lock(owner.as_bytes())?;

        let mut subscription = self
            .find_subscription_by_provider_id(provider_subscription_id)?
            .ok_or_else(not_found)?;
        if subscription.status == SubscriptionStatus::Canceled {
            return Ok(subscription);
        }

        subscription.cancel(canceled_at);
        let mut batch = Batch::default();
        Self::stage_subscription(&mut batch, &subscription)?;
        self.backend.write(batch)?;

        Ok(subscription)
    }

    // =========================================================================
    // Audit
    // =========================================================================

    fn get_transaction_by_session(&self, provider_session_id: &str) -> Result<Option<Transaction>> {
        let Some(id_bytes) = self
            .backend
            .get(cf::PROVIDER_SESSIONS, &keys::provider_key(provider_session_id))?
        else {
            return Ok(None);
        };
        let id = TransactionId::from_bytes(keys::read_id_bytes(&id_bytes, 0)?);
        self.read(cf::TRANSACTIONS, &keys::transaction_key(&id))
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>> {
        let mut ids = self.user_ids(cf::TRANSACTIONS_BY_USER, user_id, TransactionId::from_bytes)?;

        // ULIDs are time-ordered; reverse for newest first.
        ids.reverse();

        let mut transactions = Vec::new();
        for id in ids.into_iter().skip(offset).take(limit) {
            if let Some(tx) = self.read(cf::TRANSACTIONS, &keys::transaction_key(&id))? {
                transactions.push(tx);
            }
        }
        Ok(transactions)
    }

    fn list_purchased_documents(&self, user_id: &UserId) -> Result<Vec<PurchasedDocument>> {
        self.backend
            .scan_prefix(cf::PURCHASED_DOCUMENTS, &keys::user_prefix(user_id))?
            .into_iter()
            .map(|(_, value)| Self::deserialize(&value))
            .collect()
    }

    // =========================================================================
    // Entitlement and consumption
    // =========================================================================

    fn get_consumption(
        &self,
        user_id: &UserId,
        idempotency_key: &str,
    ) -> Result<Option<ConsumptionRecord>> {
        self.read(cf::CONSUMPTIONS, &keys::consumption_key(user_id, idempotency_key))
    }

    fn evaluate(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Entitlement> {
        let balance = self.get_balance(user_id)?;
        let subscriptions = self.list_subscriptions_by_user(user_id)?;
        Ok(evaluate(balance.credits, &subscriptions, now))
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn apply_payment(
        &self,
        transaction: &Transaction,
        mutation: LedgerMutation,
    ) -> Result<MutationEffect> {
        let session_id = transaction.provider_session_id.as_str();
        let _session_guard = self.session_locks.lock(session_id.as_bytes())?;

        if self.get_transaction_by_session(session_id)?.is_some() {
            return Err(StoreError::DuplicateSession {
                session_id: session_id.to_string(),
            });
        }

        let _user_guard = self.user_locks.lock(transaction.user_id.as_bytes())?;
        let now = Utc::now();

        let mut batch = Batch::default();
        let effect = self.apply_mutation(&mut batch, transaction, mutation, now)?;
        if matches!(effect, MutationEffect::RenewalSkipped { .. }) {
            return Ok(effect);
        }

        Self::stage_transaction(&mut batch, transaction)?;
        self.backend.write(batch)?;

        info!(
            user_id = %transaction.user_id,
            session_id = %session_id,
            transaction_id = %transaction.id,
            "Payment applied"
        );
        Ok(effect)
    }

    fn consume(
        &self,
        user_id: &UserId,
        idempotency_key: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome> {
        let _guard = self.user_locks.lock(user_id.as_bytes())?;

        if let Some(prior) = self.get_consumption(user_id, idempotency_key)? {
            debug!(user_id = %user_id, idempotency_key, "Returning recorded consumption");
            return Ok(ConsumeOutcome::Consumed(prior));
        }

        let balance = self.get_balance(user_id)?;
        let subscriptions = self.list_subscriptions_by_user(user_id)?;
        let resource = match evaluate(balance.credits, &subscriptions, now) {
            Entitlement::Permitted(resource) => resource,
            Entitlement::Denied(_) => {
                return Ok(ConsumeOutcome::Rejected {
                    reason: DenialReason::Exhausted,
                })
            }
        };

        let mut batch = Batch::default();
        let remaining = self.stage_debit(&mut batch, user_id, resource, subscriptions, now)?;

        let record = ConsumptionRecord {
            user_id: *user_id,
            idempotency_key: idempotency_key.to_string(),
            resource,
            remaining,
            consumed_at: now,
        };
        batch.put(
            cf::CONSUMPTIONS,
            keys::consumption_key(user_id, idempotency_key),
            Self::serialize(&record)?,
        );
        self.backend.write(batch)?;

        debug!(
            user_id = %user_id,
            idempotency_key,
            resource = resource.as_str(),
            remaining,
            "Consumed one unit"
        );
        Ok(ConsumeOutcome::Consumed(record))
    }
}
