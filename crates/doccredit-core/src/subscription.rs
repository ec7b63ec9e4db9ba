//! Subscription rows and their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::SubscriptionPlan;
use crate::ids::{SubscriptionId, UserId};
use crate::ledger::RenewalSkip;

/// Lifecycle status of a subscription row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Paid and within its period.
    Active,
    /// Canceled by the provider or superseded by a newer subscription. Terminal.
    Canceled,
    /// Period ended without renewal.
    Expired,
}

/// A recurring document allowance.
///
/// Rows are never deleted. A newer active subscription for the same user
/// supersedes older ones by marking them canceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Local row id.
    pub id: SubscriptionId,
    /// Owner.
    pub user_id: UserId,
    /// Payment provider's subscription id (unique).
    pub provider_subscription_id: String,
    /// Catalog plan id.
    pub plan_id: String,
    /// Stored status. Expiry is not written back; see [`Subscription::effective_status`].
    pub status: SubscriptionStatus,
    /// Documents left in the current period.
    pub documents_remaining: u32,
    /// Start of the current billing period.
    pub current_period_start: DateTime<Utc>,
    /// End of the current billing period.
    pub current_period_end: DateTime<Utc>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Build a fresh active subscription with the plan's full allowance.
    #[must_use]
    pub fn activate(
        user_id: UserId,
        provider_subscription_id: impl Into<String>,
        plan: &SubscriptionPlan,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: SubscriptionId::generate(),
            user_id,
            provider_subscription_id: provider_subscription_id.into(),
            plan_id: plan.id.clone(),
            status: SubscriptionStatus::Active,
            documents_remaining: plan.documents_limit,
            current_period_start: period_start,
            current_period_end: period_end,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the row counts as the user's active subscription at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.current_period_end >= now
    }

    /// Status as seen at `now`, with lazy expiry applied.
    #[must_use]
    pub fn effective_status(&self, now: DateTime<Utc>) -> SubscriptionStatus {
        match self.status {
            SubscriptionStatus::Active if self.current_period_end < now => {
                SubscriptionStatus::Expired
            }
            status => status,
        }
    }

    /// Pick the active row at `now`, preferring the most recently created.
    ///
    /// Ties on `created_at` fall back to the row id, which is time-ordered.
    pub fn latest_active<'a, I>(rows: I, now: DateTime<Utc>) -> Option<&'a Self>
    where
        I: IntoIterator<Item = &'a Self>,
    {
        rows.into_iter()
            .filter(|s| s.is_active_at(now))
            .max_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)))
    }

    /// Decide whether a renewal for a period ending at `period_end` applies.
    ///
    /// Canceled rows never come back, and a renewal whose period does not
    /// advance the stored one is a late or replayed delivery.
    ///
    /// # Errors
    ///
    /// Returns the reason the renewal must be skipped.
    pub fn check_renewal(&self, period_end: DateTime<Utc>) -> Result<(), RenewalSkip> {
        if self.status == SubscriptionStatus::Canceled {
            return Err(RenewalSkip::Canceled);
        }
        if period_end <= self.current_period_end {
            return Err(RenewalSkip::StalePeriod);
        }
        Ok(())
    }

    /// Reset the allowance for a new period and mark the row active.
    pub fn renew(
        &mut self,
        documents_limit: u32,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) {
        self.status = SubscriptionStatus::Active;
        self.documents_remaining = documents_limit;
        self.current_period_start = period_start;
        self.current_period_end = period_end;
        self.updated_at = now;
    }

    /// Mark the row canceled. `documents_remaining` is kept for audit.
    pub fn cancel(&mut self, now: DateTime<Utc>) {
        self.status = SubscriptionStatus::Canceled;
        self.updated_at = now;
    }
}
