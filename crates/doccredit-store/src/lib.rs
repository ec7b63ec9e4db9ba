//! Ledger storage for doccredit.
//!
//! This crate stores credit balances, subscription rows, audit transactions,
//! consumption records and single-document purchases, and implements the
//! compound operations that must be atomic:
//!
//! - [`Store::apply_payment`] writes a reconciled payment's ledger mutation
//!   together with its audit transaction, refusing a second transaction for
//!   the same provider session.
//! - [`Store::consume`] re-evaluates entitlement and debits one unit under the
//!   user's lock, recording the caller's idempotency key.
//!
//! # Architecture
//!
//! [`LedgerStore`] holds the ledger logic and is generic over a key/value
//! [`Backend`]. Two backends ship: `RocksDB` (feature `rocksdb-backend`) and
//! an in-memory map. Values are CBOR. Column families:
//!
//! - `balances`: credit balance per `user_id`
//! - `subscriptions` (+ `subscriptions_by_user`, `subscriptions_by_provider`)
//! - `transactions` (+ `transactions_by_user`, `provider_sessions`)
//! - `consumptions`: keyed by `user_id || idempotency_key`
//! - `purchased_documents`: keyed by `user_id || purchase_id`
//!
//! # Example
//!
//! ```
//! use doccredit_store::{MemoryStore, Store};
//! use doccredit_core::UserId;
//!
//! let store = MemoryStore::new();
//! let user_id = UserId::generate();
//!
//! assert_eq!(store.get_balance(&user_id).unwrap().credits, 0);
//! store.increment_credits(&user_id, 5).unwrap();
//! assert_eq!(store.get_balance(&user_id).unwrap().credits, 5);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod backend;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod locks;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
pub mod schema;

pub use backend::{Backend, Batch};
pub use error::{Result, StoreError};
pub use ledger::{LedgerStore, MemoryStore};
pub use memory::MemoryBackend;
#[cfg(feature = "rocksdb-backend")]
pub use ledger::RocksStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksBackend;

use chrono::{DateTime, Utc};
use doccredit_core::{
    ConsumeOutcome, ConsumptionRecord, CreditBalance, Entitlement, LedgerMutation,
    MutationEffect, PurchasedDocument, Subscription, SubscriptionId, Transaction, UserId,
};

/// The storage trait defining all ledger operations.
///
/// Every mutating method serializes on the affected user, so callers never
/// need their own read-then-write sequences.
pub trait Store: Send + Sync {
    // =========================================================================
    // Balances
    // =========================================================================

    /// Get a user's credit balance. Users with no row have zero credits.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_balance(&self, user_id: &UserId) -> Result<CreditBalance>;

    /// Add credits. Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if `amount` is zero.
    fn increment_credits(&self, user_id: &UserId, amount: u64) -> Result<u64>;

    /// Remove credits without going negative. Returns the new balance.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidAmount` if `amount` is zero.
    /// - `StoreError::InsufficientBalance` if fewer than `amount` credits remain.
    fn decrement_credits(&self, user_id: &UserId, amount: u64) -> Result<u64>;

    // =========================================================================
    // Subscriptions
    // =========================================================================

    /// Get the subscription that is active at `now`, if any.
    ///
    /// Active means `status = active` and `current_period_end >= now`; the
    /// most recently created row wins if several qualify.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_active_subscription(
        &self,
        user_id: &UserId,
        now: DateTime<Utc>,
    ) -> Result<Option<Subscription>>;

    /// Get a subscription by local id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, subscription_id: &SubscriptionId) -> Result<Option<Subscription>>;

    /// Get a subscription by the provider's subscription id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_subscription_by_provider_id(
        &self,
        provider_subscription_id: &str,
    ) -> Result<Option<Subscription>>;

    /// List all of a user's subscription rows, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_subscriptions_by_user(&self, user_id: &UserId) -> Result<Vec<Subscription>>;

    /// Remove documents from one subscription's allowance. Returns what is left.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if the subscription doesn't exist.
    /// - `StoreError::InsufficientBalance` if fewer than `amount` documents remain.
    fn decrement_subscription_documents(
        &self,
        subscription_id: &SubscriptionId,
        amount: u32,
    ) -> Result<u32>;

    /// Insert or refresh a subscription and make it the user's only active row.
    ///
    /// A row with the same provider id is updated in place (keeping its id
    /// and `created_at`); other active rows of the user are marked canceled.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn upsert_subscription(&self, subscription: &Subscription) -> Result<Subscription>;

    /// Mark a subscription canceled as of the provider's `canceled_at`. Idempotent.
    ///
    /// # Errors
    ///
    /// - `StoreError::NotFound` if no subscription has this provider id.
    fn mark_subscription_canceled(
        &self,
        provider_subscription_id: &str,
        canceled_at: DateTime<Utc>,
    ) -> Result<Subscription>;

    // =========================================================================
    // Audit
    // =========================================================================

    /// Get the transaction recorded for a provider session, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction_by_session(&self, provider_session_id: &str) -> Result<Option<Transaction>>;

    /// List transactions for a user, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Transaction>>;

    /// List a user's single-document purchases, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_purchased_documents(&self, user_id: &UserId) -> Result<Vec<PurchasedDocument>>;

    // =========================================================================
    // Entitlement and consumption
    // =========================================================================

    /// Get the consumption recorded under an idempotency key, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_consumption(
        &self,
        user_id: &UserId,
        idempotency_key: &str,
    ) -> Result<Option<ConsumptionRecord>>;

    /// Evaluate entitlement from a fresh read of the ledger.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn evaluate(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<Entitlement>;

    // =========================================================================
    // Compound Operations
    // =========================================================================

    /// Apply a reconciled payment: the ledger mutation and its audit
    /// transaction are written in one atomic batch.
    ///
    /// A renewal that must be skipped writes nothing, transaction included.
    ///
    /// # Errors
    ///
    /// - `StoreError::DuplicateSession` if the session already has a transaction.
    /// - `StoreError::NotFound` if a renewal targets an unknown subscription.
    fn apply_payment(
        &self,
        transaction: &Transaction,
        mutation: LedgerMutation,
    ) -> Result<MutationEffect>;

    /// Consume one unit for a generation attempt.
    ///
    /// Under the user's lock: return the prior record for the key if any,
    /// otherwise re-evaluate entitlement, debit the chosen resource and record
    /// the key. Returns `Rejected { Exhausted }` when nothing is left.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn consume(
        &self,
        user_id: &UserId,
        idempotency_key: &str,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome>;
}
