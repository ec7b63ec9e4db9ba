//! Typed payment events.
//!
//! Provider payloads are parsed and validated at the HTTP boundary and
//! turned into one of these variants before the reconciler sees them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::UserId;
use crate::transaction::TransactionType;

/// A provider notification the reconciler understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    /// A checkout session finished (synchronously or after async settlement).
    CheckoutCompleted(CheckoutCompleted),
    /// An asynchronous checkout payment failed.
    CheckoutFailed(CheckoutFailed),
    /// A subscription invoice was paid (renewal).
    InvoicePaid(InvoicePaid),
    /// A subscription was deleted at the provider.
    SubscriptionCanceled(SubscriptionCanceled),
}

impl PaymentEvent {
    /// Short name used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CheckoutCompleted(_) => "checkout_completed",
            Self::CheckoutFailed(_) => "checkout_failed",
            Self::InvoicePaid(_) => "invoice_paid",
            Self::SubscriptionCanceled(_) => "subscription_canceled",
        }
    }
}

/// Provider-reported payment status of a checkout session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Funds captured.
    Paid,
    /// Not yet paid (e.g. delayed payment methods).
    Unpaid,
    /// Nothing to pay (full discount or trial).
    NoPaymentRequired,
}

impl PaymentStatus {
    /// Whether the session may be granted.
    #[must_use]
    pub const fn is_paid(self) -> bool {
        matches!(self, Self::Paid)
    }
}

/// A billing period reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    /// Period start.
    pub start: DateTime<Utc>,
    /// Period end.
    pub end: DateTime<Utc>,
}

/// What a checkout session paid for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Purchase {
    /// A recurring plan.
    Subscription {
        /// Provider subscription id created by the checkout.
        provider_subscription_id: String,
        /// Catalog plan id from session metadata.
        plan_id: Option<String>,
        /// Provider price id from the line item.
        price_id: Option<String>,
        /// Period reported by the provider, when known.
        period: Option<BillingPeriod>,
    },
    /// A credit package.
    Credits {
        /// Catalog package id from session metadata.
        package_id: Option<String>,
        /// Credits to grant, from session metadata.
        credits: u64,
    },
    /// A single document.
    Document {
        /// Catalog document type.
        document_type: String,
    },
}

impl Purchase {
    /// Audit type for a transaction paying for this purchase.
    #[must_use]
    pub const fn transaction_type(&self) -> TransactionType {
        match self {
            Self::Subscription { .. } => TransactionType::Subscription,
            Self::Credits { .. } => TransactionType::CreditPurchase,
            Self::Document { .. } => TransactionType::DocumentPurchase,
        }
    }
}

/// `checkout.session.completed` (or async success).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutCompleted {
    /// Checkout session id; the dedup key.
    pub session_id: String,
    /// Paying user from session metadata.
    pub user_id: UserId,
    /// Provider payment status.
    pub payment_status: PaymentStatus,
    /// Total in minor units.
    pub amount_cents: i64,
    /// ISO currency code.
    pub currency: String,
    /// What was bought.
    pub purchase: Purchase,
}

/// `checkout.session.async_payment_failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutFailed {
    /// Checkout session id.
    pub session_id: String,
    /// Paying user from session metadata.
    pub user_id: UserId,
    /// Total in minor units.
    pub amount_cents: i64,
    /// ISO currency code.
    pub currency: String,
    /// What would have been bought.
    pub purchase: Purchase,
}

/// `invoice.paid` / `invoice.payment_succeeded` for a subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoicePaid {
    /// Invoice id; the dedup key for renewals.
    pub invoice_id: String,
    /// Subscription being renewed.
    pub provider_subscription_id: String,
    /// Total in minor units.
    pub amount_cents: i64,
    /// ISO currency code.
    pub currency: String,
    /// The period the invoice pays for.
    pub period: BillingPeriod,
    /// Price id from the invoice line, if present.
    pub price_id: Option<String>,
}

/// `customer.subscription.deleted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionCanceled {
    /// Subscription that ended.
    pub provider_subscription_id: String,
    /// Provider-reported cancellation time.
    pub canceled_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_maps_to_transaction_type() {
        let credits = Purchase::Credits {
            package_id: Some("small-pack".into()),
            credits: 5,
        };
        assert_eq!(credits.transaction_type(), TransactionType::CreditPurchase);

        let doc = Purchase::Document {
            document_type: "contract".into(),
        };
        assert_eq!(doc.transaction_type(), TransactionType::DocumentPurchase);
    }

    #[test]
    fn only_paid_is_grantable() {
        assert!(PaymentStatus::Paid.is_paid());
        assert!(!PaymentStatus::Unpaid.is_paid());
        assert!(!PaymentStatus::NoPaymentRequired.is_paid());
    }
}
