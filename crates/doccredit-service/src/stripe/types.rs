//! Stripe API types.
//!
//! Only the fields the ledger reads are modeled; everything else in the
//! payload is ignored.

use std::collections::HashMap;

use serde::Deserialize;

/// A field Stripe returns either as an id or, when expanded, as the object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Expandable<T> {
    /// Unexpanded id.
    Id(String),
    /// Expanded object.
    Object(Box<T>),
}

/// Objects that carry a Stripe id.
pub trait HasId {
    /// The object's id.
    fn id(&self) -> &str;
}

impl<T: HasId> Expandable<T> {
    /// The referenced id, expanded or not.
    pub fn id(&self) -> &str {
        match self {
            Self::Id(id) => id,
            Self::Object(object) => object.id(),
        }
    }

    /// The expanded object, if Stripe returned one.
    pub fn object(&self) -> Option<&T> {
        match self {
            Self::Id(_) => None,
            Self::Object(object) => Some(object),
        }
    }
}

/// Stripe Checkout session object.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Session ID (`cs_...`).
    pub id: String,
    /// Hosted checkout URL to redirect the user to.
    #[serde(default)]
    pub url: Option<String>,
    /// `payment` or `subscription`.
    #[serde(default)]
    pub mode: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,
    /// `open`, `complete` or `expired`.
    #[serde(default)]
    pub status: Option<String>,
    /// Total amount in minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// Three-letter currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// Client reference ID (our `user_id`).
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Subscription created by a `subscription` mode session.
    #[serde(default)]
    pub subscription: Option<Expandable<StripeSubscription>>,
    /// Metadata set at creation.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Stripe subscription object.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeSubscription {
    /// Subscription ID (`sub_...`).
    pub id: String,
    /// Stripe status (`active`, `canceled`, ...).
    #[serde(default)]
    pub status: Option<String>,
    /// Current period start (Unix).
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// Current period end (Unix).
    #[serde(default)]
    pub current_period_end: Option<i64>,
    /// When cancellation was requested (Unix).
    #[serde(default)]
    pub canceled_at: Option<i64>,
    /// When the subscription ended (Unix).
    #[serde(default)]
    pub ended_at: Option<i64>,
    /// Subscription items.
    #[serde(default)]
    pub items: Option<StripeList<SubscriptionItem>>,
    /// Metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl HasId for StripeSubscription {
    fn id(&self) -> &str {
        &self.id
    }
}

impl StripeSubscription {
    /// Price id of the first item.
    #[must_use]
    pub fn price_id(&self) -> Option<&str> {
        self.first_item()
            .and_then(|item| item.price.as_ref())
            .map(|price| price.id.as_str())
    }

    /// Current period, falling back to the first item's period.
    #[must_use]
    pub fn period(&self) -> Option<(i64, i64)> {
        match (self.current_period_start, self.current_period_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => self.first_item().and_then(|item| {
                Some((item.current_period_start?, item.current_period_end?))
            }),
        }
    }

    fn first_item(&self) -> Option<&SubscriptionItem> {
        self.items.as_ref().and_then(|items| items.data.first())
    }
}

/// One item of a subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionItem {
    /// Item ID.
    pub id: String,
    /// Price of the item.
    #[serde(default)]
    pub price: Option<Price>,
    /// Item period start (Unix), on newer API versions.
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// Item period end (Unix), on newer API versions.
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

/// Stripe price (only its id is read).
#[derive(Debug, Clone, Deserialize)]
pub struct Price {
    /// Price ID (`price_...`).
    pub id: String,
}

/// Stripe invoice object.
#[derive(Debug, Clone, Deserialize)]
pub struct Invoice {
    /// Invoice ID (`in_...`).
    pub id: String,
    /// Subscription billed by this invoice.
    #[serde(default)]
    pub subscription: Option<Expandable<StripeSubscription>>,
    /// Where newer API versions put the subscription.
    #[serde(default)]
    pub parent: Option<InvoiceParent>,
    /// Amount paid in minor units.
    #[serde(default)]
    pub amount_paid: i64,
    /// Three-letter currency code.
    #[serde(default)]
    pub currency: Option<String>,
    /// `subscription_create`, `subscription_cycle`, ...
    #[serde(default)]
    pub billing_reason: Option<String>,
    /// Invoice lines.
    #[serde(default)]
    pub lines: Option<StripeList<InvoiceLine>>,
}

impl Invoice {
    /// The billed subscription id, wherever the API version put it.
    #[must_use]
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_ref().map(Expandable::id).or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.subscription_details.as_ref())
                .map(|d| d.subscription.as_str())
        })
    }

    /// First invoice line carrying a period.
    #[must_use]
    pub fn period_line(&self) -> Option<&InvoiceLine> {
        self.lines
            .as_ref()
            .and_then(|lines| lines.data.iter().find(|line| line.period.is_some()))
    }
}

/// Invoice parent (newer API versions).
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceParent {
    /// Set when the invoice was generated by a subscription.
    #[serde(default)]
    pub subscription_details: Option<SubscriptionDetails>,
}

/// Subscription reference on an invoice parent.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionDetails {
    /// Subscription ID.
    pub subscription: String,
}

/// One invoice line.
#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceLine {
    /// Period the line pays for.
    #[serde(default)]
    pub period: Option<Period>,
    /// Price billed.
    #[serde(default)]
    pub price: Option<Price>,
}

/// A Unix-time period.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Period {
    /// Start (Unix).
    pub start: i64,
    /// End (Unix).
    pub end: i64,
}

/// Stripe list response wrapper.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeList<T> {
    /// Data items.
    pub data: Vec<T>,
    /// Whether there are more items.
    #[serde(default)]
    pub has_more: bool,
}

/// Stripe webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Event ID.
    pub id: String,
    /// Event type (e.g., "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event data.
    pub data: WebhookEventData,
    /// Created timestamp (Unix).
    pub created: i64,
}

/// Webhook event data container.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    /// The event object.
    pub object: serde_json::Value,
}

/// Stripe API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorResponse {
    /// Error details.
    pub error: StripeErrorDetail,
}

/// Stripe error detail.
#[derive(Debug, Clone, Deserialize)]
pub struct StripeErrorDetail {
    /// Error type.
    #[serde(rename = "type")]
    pub error_type: String,
    /// Error message.
    #[serde(default)]
    pub message: String,
    /// Error code.
    #[serde(default)]
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expandable_subscription_accepts_id_or_object() {
        let by_id: CheckoutSession =
            serde_json::from_str(r#"{"id":"cs_1","subscription":"sub_1"}"#).unwrap();
        assert_eq!(by_id.subscription.as_ref().unwrap().id(), "sub_1");
        assert!(by_id.subscription.unwrap().object().is_none());

        let expanded: CheckoutSession = serde_json::from_str(
            r#"{"id":"cs_2","subscription":{"id":"sub_2","current_period_start":1,
                "current_period_end":2,"items":{"data":[{"id":"si_1","price":{"id":"price_9"}}]}}}"#,
        )
        .unwrap();
        let sub = expanded.subscription.as_ref().unwrap();
        assert_eq!(sub.id(), "sub_2");
        assert_eq!(sub.object().unwrap().price_id(), Some("price_9"));
        assert_eq!(sub.object().unwrap().period(), Some((1, 2)));
    }

    #[test]
    fn invoice_subscription_from_parent() {
        let invoice: Invoice = serde_json::from_str(
            r#"{"id":"in_1","parent":{"subscription_details":{"subscription":"sub_7"}}}"#,
        )
        .unwrap();
        assert_eq!(invoice.subscription_id(), Some("sub_7"));
    }

    #[test]
    fn subscription_period_falls_back_to_item() {
        let sub: StripeSubscription = serde_json::from_str(
            r#"{"id":"sub_3","items":{"data":[{"id":"si_1",
                "current_period_start":10,"current_period_end":20}]}}"#,
        )
        .unwrap();
        assert_eq!(sub.period(), Some((10, 20)));
    }
}
