//! Conversion of verified Stripe payloads into typed payment events.

use chrono::{DateTime, Utc};

use doccredit_core::catalog::DEFAULT_CURRENCY;
use doccredit_core::{
    BillingPeriod, CheckoutCompleted, CheckoutFailed, InvoicePaid, PaymentEvent, PaymentStatus,
    Purchase, SubscriptionCanceled, UserId,
};

use super::types::{CheckoutSession, Invoice, StripeSubscription, WebhookEvent};

/// A signed payload that cannot be turned into a payment event.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    /// The event object does not have the expected shape.
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field has a value the ledger does not understand.
    #[error("invalid {field}: {value}")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },
}

/// Parse a webhook event. Returns `None` for event types the ledger ignores.
///
/// # Errors
///
/// Returns an error if a handled event type carries an unusable object.
pub fn parse_event(event: &WebhookEvent) -> Result<Option<PaymentEvent>, EventError> {
    let object = &event.data.object;
    let parsed = match event.event_type.as_str() {
        "checkout.session.completed" | "checkout.session.async_payment_succeeded" => {
            let session: CheckoutSession = serde_json::from_value(object.clone())?;
            Some(PaymentEvent::CheckoutCompleted(checkout_completed(&session)?))
        }
        "checkout.session.async_payment_failed" => {
            let session: CheckoutSession = serde_json::from_value(object.clone())?;
            Some(PaymentEvent::CheckoutFailed(checkout_failed(&session)?))
        }
        "invoice.paid" | "invoice.payment_succeeded" => {
            let invoice: Invoice = serde_json::from_value(object.clone())?;
            invoice_paid(&invoice)?.map(PaymentEvent::InvoicePaid)
        }
        "customer.subscription.deleted" => {
            let subscription: StripeSubscription = serde_json::from_value(object.clone())?;
            Some(PaymentEvent::SubscriptionCanceled(subscription_canceled(
                &subscription,
                event.created,
            )?))
        }
        _ => None,
    };
    Ok(parsed)
}

/// Build a `CheckoutCompleted` from a session (webhook or verification lookup).
///
/// # Errors
///
/// Returns an error if the session lacks the user, status or purchase details.
pub fn checkout_completed(session: &CheckoutSession) -> Result<CheckoutCompleted, EventError> {
    Ok(CheckoutCompleted {
        session_id: session.id.clone(),
        user_id: session_user(session)?,
        payment_status: payment_status(session)?,
        amount_cents: session.amount_total.unwrap_or(0),
        currency: session_currency(session),
        purchase: purchase(session)?,
    })
}

fn checkout_failed(session: &CheckoutSession) -> Result<CheckoutFailed, EventError> {
    Ok(CheckoutFailed {
        session_id: session.id.clone(),
        user_id: session_user(session)?,
        amount_cents: session.amount_total.unwrap_or(0),
        currency: session_currency(session),
        purchase: purchase(session)?,
    })
}

fn invoice_paid(invoice: &Invoice) -> Result<Option<InvoicePaid>, EventError> {
    // The first invoice is covered by the checkout session that created the subscription.
    if invoice.billing_reason.as_deref() == Some("subscription_create") {
        return Ok(None);
    }
    let Some(subscription_id) = invoice.subscription_id() else {
        return Ok(None);
    };

    let line = invoice
        .period_line()
        .ok_or(EventError::MissingField("lines.data.period"))?;
    let period = line.period.ok_or(EventError::MissingField("lines.data.period"))?;

    Ok(Some(InvoicePaid {
        invoice_id: invoice.id.clone(),
        provider_subscription_id: subscription_id.to_string(),
        amount_cents: invoice.amount_paid,
        currency: invoice
            .currency
            .clone()
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        period: billing_period(period.start, period.end)?,
        price_id: line.price.as_ref().map(|p| p.id.clone()),
    }))
}

fn subscription_canceled(
    subscription: &StripeSubscription,
    event_created: i64,
) -> Result<SubscriptionCanceled, EventError> {
    let canceled_at = subscription
        .ended_at
        .or(subscription.canceled_at)
        .unwrap_or(event_created);
    Ok(SubscriptionCanceled {
        provider_subscription_id: subscription.id.clone(),
        canceled_at: timestamp(canceled_at, "canceled_at")?,
    })
}

fn session_user(session: &CheckoutSession) -> Result<UserId, EventError> {
    let raw = session
        .metadata
        .get("user_id")
        .or(session.client_reference_id.as_ref())
        .ok_or(EventError::MissingField("metadata.user_id"))?;
    raw.parse().map_err(|_| EventError::InvalidField {
        field: "metadata.user_id",
        value: raw.clone(),
    })
}

fn payment_status(session: &CheckoutSession) -> Result<PaymentStatus, EventError> {
    match session.payment_status.as_deref() {
        Some("paid") => Ok(PaymentStatus::Paid),
        Some("unpaid") => Ok(PaymentStatus::Unpaid),
        Some("no_payment_required") => Ok(PaymentStatus::NoPaymentRequired),
        Some(other) => Err(EventError::InvalidField {
            field: "payment_status",
            value: other.to_string(),
        }),
        None => Err(EventError::MissingField("payment_status")),
    }
}

fn session_currency(session: &CheckoutSession) -> String {
    session
        .currency
        .clone()
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string())
}

fn purchase(session: &CheckoutSession) -> Result<Purchase, EventError> {
    let metadata = &session.metadata;
    let kind = metadata.get("type").map(String::as_str).or_else(|| {
        if session.mode.as_deref() == Some("subscription") {
            Some("subscription")
        } else if metadata.contains_key("document_type") {
            Some("document")
        } else if metadata.contains_key("credits") || metadata.contains_key("package_id") {
            Some("credits")
        } else {
            None
        }
    });

    match kind {
        Some("subscription") => {
            let subscription = session
                .subscription
                .as_ref()
                .ok_or(EventError::MissingField("subscription"))?;
            let expanded = subscription.object();
            let period = expanded
                .and_then(StripeSubscription::period)
                .map(|(start, end)| billing_period(start, end))
                .transpose()?;
            Ok(Purchase::Subscription {
                provider_subscription_id: subscription.id().to_string(),
                plan_id: metadata.get("plan_id").cloned(),
                price_id: expanded
                    .and_then(StripeSubscription::price_id)
                    .map(str::to_string),
                period,
            })
        }
        Some("credits") => {
            let credits = match metadata.get("credits") {
                Some(raw) => raw.parse().map_err(|_| EventError::InvalidField {
                    field: "metadata.credits",
                    value: raw.clone(),
                })?,
                None => 0,
            };
            Ok(Purchase::Credits {
                package_id: metadata.get("package_id").cloned(),
                credits,
            })
        }
        Some("document") => Ok(Purchase::Document {
            document_type: metadata
                .get("document_type")
                .cloned()
                .ok_or(EventError::MissingField("metadata.document_type"))?,
        }),
        Some(other) => Err(EventError::InvalidField {
            field: "metadata.type",
            value: other.to_string(),
        }),
        None => Err(EventError::MissingField("metadata.type")),
    }
}

fn billing_period(start: i64, end: i64) -> Result<BillingPeriod, EventError> {
    Ok(BillingPeriod {
        start: timestamp(start, "period.start")?,
        end: timestamp(end, "period.end")?,
    })
}

fn timestamp(secs: i64, field: &'static str) -> Result<DateTime<Utc>, EventError> {
    DateTime::from_timestamp(secs, 0).ok_or(EventError::InvalidField {
        field,
        value: secs.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(event_type: &str, object: serde_json::Value) -> WebhookEvent {
        serde_json::from_value(json!({
            "id": "evt_1",
            "type": event_type,
            "created": 1_700_000_000,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn credit_checkout_parses() {
        let user_id = UserId::generate();
        let parsed = parse_event(&event(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "mode": "payment",
                "payment_status": "paid",
                "amount_total": 499,
                "currency": "eur",
                "metadata": {"user_id": user_id.to_string(), "type": "credits",
                             "package_id": "small-pack", "credits": "5"}
            }),
        ))
        .unwrap();

        let Some(PaymentEvent::CheckoutCompleted(completed)) = parsed else {
            panic!("expected checkout completed, got {parsed:?}");
        };
        assert_eq!(completed.user_id, user_id);
        assert_eq!(completed.payment_status, PaymentStatus::Paid);
        assert_eq!(
            completed.purchase,
            Purchase::Credits {
                package_id: Some("small-pack".into()),
                credits: 5
            }
        );
    }

    #[test]
    fn subscription_checkout_uses_client_reference() {
        let user_id = UserId::generate();
        let parsed = parse_event(&event(
            "checkout.session.async_payment_succeeded",
            json!({
                "id": "cs_2",
                "mode": "subscription",
                "payment_status": "paid",
                "client_reference_id": user_id.to_string(),
                "subscription": "sub_1",
                "metadata": {"plan_id": "premium"}
            }),
        ))
        .unwrap();

        let Some(PaymentEvent::CheckoutCompleted(completed)) = parsed else {
            panic!("expected checkout completed");
        };
        assert_eq!(completed.currency, DEFAULT_CURRENCY);
        assert!(matches!(
            completed.purchase,
            Purchase::Subscription { ref provider_subscription_id, ref plan_id, period: None, .. }
                if provider_subscription_id == "sub_1" && plan_id.as_deref() == Some("premium")
        ));
    }

    #[test]
    fn initial_invoice_is_ignored() {
        let parsed = parse_event(&event(
            "invoice.paid",
            json!({"id": "in_1", "subscription": "sub_1", "billing_reason": "subscription_create"}),
        ))
        .unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn renewal_invoice_parses_period() {
        let parsed = parse_event(&event(
            "invoice.payment_succeeded",
            json!({
                "id": "in_2",
                "subscription": "sub_1",
                "billing_reason": "subscription_cycle",
                "amount_paid": 999,
                "lines": {"data": [{"period": {"start": 1_700_000_000, "end": 1_702_592_000},
                                    "price": {"id": "price_basic"}}]}
            }),
        ))
        .unwrap();
        let Some(PaymentEvent::InvoicePaid(paid)) = parsed else {
            panic!("expected invoice paid");
        };
        assert_eq!(paid.provider_subscription_id, "sub_1");
        assert_eq!(paid.period.end.timestamp(), 1_702_592_000);
        assert_eq!(paid.price_id.as_deref(), Some("price_basic"));
    }

    #[test]
    fn deletion_falls_back_to_event_time() {
        let parsed = parse_event(&event(
            "customer.subscription.deleted",
            json!({"id": "sub_9", "status": "canceled"}),
        ))
        .unwrap();
        let Some(PaymentEvent::SubscriptionCanceled(canceled)) = parsed else {
            panic!("expected cancellation");
        };
        assert_eq!(canceled.canceled_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn unknown_types_are_ignored_and_bad_objects_rejected() {
        assert!(parse_event(&event("customer.created", json!({})))
            .unwrap()
            .is_none());

        let missing_user = parse_event(&event(
            "checkout.session.completed",
            json!({"id": "cs_3", "payment_status": "paid", "metadata": {"type": "credits"}}),
        ));
        assert!(matches!(
            missing_user,
            Err(EventError::MissingField("metadata.user_id"))
        ));
    }
}
