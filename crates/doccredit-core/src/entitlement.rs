//! Entitlement evaluation.
//!
//! `evaluate` is a pure function over a snapshot of the user's credits and
//! subscription rows. The store calls it again under the user's lock before
//! every debit, so a decision made here is only advisory until consumed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::SubscriptionId;
use crate::subscription::Subscription;

/// Which pool a generation draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "resource", rename_all = "snake_case")]
pub enum Resource {
    /// The allowance of a specific subscription row.
    Subscription {
        /// Row being debited. Debits are scoped to this id, not to the user.
        subscription_id: SubscriptionId,
    },
    /// The user's non-expiring credit balance.
    Credits,
}

impl Resource {
    /// Wire name (`subscription` / `credits`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Subscription { .. } => "subscription",
            Self::Credits => "credits",
        }
    }

    /// Subscription id, when the resource is a subscription.
    #[must_use]
    pub const fn subscription_id(&self) -> Option<SubscriptionId> {
        match self {
            Self::Subscription { subscription_id } => Some(*subscription_id),
            Self::Credits => None,
        }
    }
}

/// Why a generation is not permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DenialReason {
    /// Neither a usable subscription nor credits.
    NoResources,
    /// Resources ran out between evaluation and debit.
    Exhausted,
    /// The ledger could not be read; entitlement is unconfirmed.
    EvaluationError,
}

impl DenialReason {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoResources => "no-resources",
            Self::Exhausted => "exhausted",
            Self::EvaluationError => "evaluation-error",
        }
    }
}

/// Result of evaluating a user's entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    /// A generation may proceed, drawing from this resource.
    Permitted(Resource),
    /// A generation must not proceed.
    Denied(DenialReason),
}

impl Entitlement {
    /// Whether a generation may proceed.
    #[must_use]
    pub const fn is_permitted(&self) -> bool {
        matches!(self, Self::Permitted(_))
    }
}

/// Decide whether a generation is permitted and which resource pays for it.
///
/// Subscription allowance is used before credits. Among several active rows
/// the most recently created one wins.
#[must_use]
pub fn evaluate(credits: u64, subscriptions: &[Subscription], now: DateTime<Utc>) -> Entitlement {
    if let Some(sub) = Subscription::latest_active(subscriptions, now) {
        if sub.documents_remaining > 0 {
            return Entitlement::Permitted(Resource::Subscription {
                subscription_id: sub.id,
            });
        }
    }

    if credits > 0 {
        Entitlement::Permitted(Resource::Credits)
    } else {
        Entitlement::Denied(DenialReason::NoResources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::ids::UserId;
    use chrono::Duration;

    fn subscription(user_id: UserId, remaining: u32, created_at: DateTime<Utc>) -> Subscription {
        let catalog = Catalog::default();
        let mut sub = Subscription::activate(
            user_id,
            format!("sub_{remaining}"),
            catalog.plan("basic").unwrap(),
            created_at,
            created_at + Duration::days(30),
            created_at,
        );
        sub.documents_remaining = remaining;
        sub
    }

    #[test]
    fn nothing_available() {
        assert_eq!(
            evaluate(0, &[], Utc::now()),
            Entitlement::Denied(DenialReason::NoResources)
        );
    }

    #[test]
    fn credits_only() {
        assert_eq!(
            evaluate(3, &[], Utc::now()),
            Entitlement::Permitted(Resource::Credits)
        );
    }

    #[test]
    fn subscription_before_credits() {
        let now = Utc::now();
        let sub = subscription(UserId::generate(), 1, now);
        assert_eq!(
            evaluate(5, std::slice::from_ref(&sub), now),
            Entitlement::Permitted(Resource::Subscription {
                subscription_id: sub.id
            })
        );
    }

    #[test]
    fn exhausted_subscription_falls_back_to_credits() {
        let now = Utc::now();
        let sub = subscription(UserId::generate(), 0, now);
        assert_eq!(evaluate(2, &[sub.clone()], now), Entitlement::Permitted(Resource::Credits));
        assert_eq!(
            evaluate(0, &[sub], now),
            Entitlement::Denied(DenialReason::NoResources)
        );
    }

    #[test]
    fn expired_subscription_ignored() {
        let now = Utc::now();
        let sub = subscription(UserId::generate(), 4, now - Duration::days(40));
        assert_eq!(
            evaluate(0, &[sub], now),
            Entitlement::Denied(DenialReason::NoResources)
        );
    }

    #[test]
    fn newest_active_row_decides() {
        let now = Utc::now();
        let user_id = UserId::generate();
        let older = subscription(user_id, 3, now - Duration::hours(2));
        let newer = subscription(user_id, 0, now - Duration::hours(1));
        // The newest row is exhausted, so credits are used even though an
        // older row still has allowance.
        assert_eq!(
            evaluate(1, &[older, newer], now),
            Entitlement::Permitted(Resource::Credits)
        );
    }

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&DenialReason::NoResources).unwrap(),
            "\"no-resources\""
        );
        let json = serde_json::to_value(Resource::Credits).unwrap();
        assert_eq!(json["resource"], "credits");
    }
}
