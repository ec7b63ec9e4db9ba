//! Ledger balances, consumption records and reconciler mutations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entitlement::{DenialReason, Resource};
use crate::ids::UserId;
use crate::subscription::Subscription;
use crate::transaction::PurchasedDocument;

/// A user's non-expiring credit balance.
///
/// Created lazily: a user with no row has zero credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    /// Owner.
    pub user_id: UserId,
    /// Credits available. One credit pays for one document.
    pub credits: u64,
    /// Last mutation time.
    pub last_updated: DateTime<Utc>,
}

impl CreditBalance {
    /// A zero balance.
    #[must_use]
    pub fn empty(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            credits: 0,
            last_updated: now,
        }
    }

    /// Add credits, returning the new balance.
    pub fn credit(&mut self, amount: u64, now: DateTime<Utc>) -> u64 {
        self.credits = self.credits.saturating_add(amount);
        self.last_updated = now;
        self.credits
    }

    /// Remove credits if enough are available, returning the new balance.
    ///
    /// Returns `None` and leaves the balance untouched otherwise.
    pub fn debit(&mut self, amount: u64, now: DateTime<Utc>) -> Option<u64> {
        let remaining = self.credits.checked_sub(amount)?;
        self.credits = remaining;
        self.last_updated = now;
        Some(remaining)
    }
}

/// A recorded debit for one generation attempt.
///
/// Keyed by `(user_id, idempotency_key)`. Retrying a key returns this
/// record instead of debiting again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    /// Debited user.
    pub user_id: UserId,
    /// Caller-supplied key for the generation attempt.
    pub idempotency_key: String,
    /// Pool that was debited.
    pub resource: Resource,
    /// What was left in that pool right after the debit.
    pub remaining: u64,
    /// When the debit was committed.
    pub consumed_at: DateTime<Utc>,
}

/// Outcome of a consumption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// One unit was debited (now or by an earlier call with the same key).
    Consumed(ConsumptionRecord),
    /// Nothing was debited.
    Rejected {
        /// Always `Exhausted` from the store.
        reason: DenialReason,
    },
}

impl ConsumeOutcome {
    /// Whether a unit was consumed.
    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        matches!(self, Self::Consumed(_))
    }
}

/// A ledger change derived from a payment event.
///
/// Applied together with its audit `Transaction` in one atomic write.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerMutation {
    /// Add credits to the paying user's balance.
    GrantCredits {
        /// Credits to add.
        credits: u64,
    },
    /// Insert a new active subscription, superseding any other active row.
    ActivateSubscription(Subscription),
    /// Reset the allowance of an existing subscription for a new period.
    RenewSubscription {
        /// Provider id of the subscription being renewed.
        provider_subscription_id: String,
        /// New allowance.
        documents_limit: u32,
        /// New period start.
        period_start: DateTime<Utc>,
        /// New period end.
        period_end: DateTime<Utc>,
    },
    /// Record a single-document purchase.
    RecordDocument(PurchasedDocument),
    /// Record the transaction only (e.g. a failed payment).
    AuditOnly,
}

/// Why a renewal was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenewalSkip {
    /// The subscription was canceled; renewals never revive it.
    Canceled,
    /// The renewal's period does not advance the stored one.
    StalePeriod,
}

/// What applying a `LedgerMutation` did.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationEffect {
    /// Credits were added.
    CreditsGranted {
        /// Balance after the grant.
        balance: u64,
    },
    /// A subscription row was inserted (or refreshed in place).
    SubscriptionActivated(Subscription),
    /// A subscription's allowance was reset.
    SubscriptionRenewed(Subscription),
    /// The renewal was not applied and nothing was written.
    RenewalSkipped {
        /// The stored row, unchanged.
        subscription: Subscription,
        /// Why.
        reason: RenewalSkip,
    },
    /// A single-document purchase was stored.
    DocumentRecorded(PurchasedDocument),
    /// Only the transaction was stored.
    Recorded,
}
