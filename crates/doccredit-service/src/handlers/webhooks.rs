//! Stripe webhook handler.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use doccredit_core::{BillingPeriod, PaymentEvent, Purchase};

use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{parse_event, verify_signature, WebhookEvent};

/// Webhook response.
///
/// Everything except a bad signature, a missing secret or a store failure
/// is acknowledged with 200 so Stripe stops retrying.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Always true.
    pub received: bool,
    /// `processed`, `duplicate`, `pending`, `skipped`, `failed`, `canceled`,
    /// `inconsistent`, `ignored` or `invalid`.
    pub status: &'static str,
    /// Stripe event ID, when the payload parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl WebhookResponse {
    fn new(status: &'static str, event_id: Option<String>) -> Json<Self> {
        Json(Self {
            received: true,
            status,
            event_id,
        })
    }
}

/// Handle Stripe webhooks.
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| ApiError::Internal("Stripe webhook secret not configured".into()))?;

    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidSignature("missing Stripe-Signature header".into()))?;

    verify_signature(
        &body,
        signature,
        secret,
        state.config.stripe_webhook_tolerance_seconds,
        Utc::now(),
    )
    .map_err(|e| ApiError::InvalidSignature(e.to_string()))?;

    let event: WebhookEvent = match serde_json::from_str(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(error = %e, "Signed Stripe payload is not an event");
            return Ok(WebhookResponse::new("invalid", None));
        }
    };

    tracing::info!(
        event_type = %event.event_type,
        event_id = %event.id,
        "Received Stripe webhook"
    );

    let payment_event = match parse_event(&event) {
        Ok(Some(payment_event)) => payment_event,
        Ok(None) => {
            tracing::debug!(event_type = %event.event_type, "Unhandled Stripe event");
            return Ok(WebhookResponse::new("ignored", Some(event.id)));
        }
        Err(e) => {
            tracing::warn!(
                event_type = %event.event_type,
                event_id = %event.id,
                error = %e,
                "Stripe event cannot be reconciled"
            );
            return Ok(WebhookResponse::new("invalid", Some(event.id)));
        }
    };

    let payment_event = with_subscription_details(&state, payment_event).await;
    let outcome = state.reconciler().reconcile(&payment_event, Utc::now())?;

    Ok(WebhookResponse::new(outcome.status(), Some(event.id)))
}

/// Fill in the subscription's period and price when the session did not embed them.
///
/// Lookup failures are logged and the reconciler falls back to the plan interval.
async fn with_subscription_details(state: &AppState, event: PaymentEvent) -> PaymentEvent {
    let (mut completed, stripe) = match (event, &state.stripe) {
        (PaymentEvent::CheckoutCompleted(completed), Some(stripe)) => (completed, stripe),
        (event, _) => return event,
    };

    if let Purchase::Subscription {
        provider_subscription_id,
        price_id,
        period,
        ..
    } = &mut completed.purchase
    {
        if period.is_none() && completed.payment_status.is_paid() {
            match stripe.get_subscription(provider_subscription_id).await {
                Ok(subscription) => {
                    *period = subscription.period().and_then(|(start, end)| {
                        Some(BillingPeriod {
                            start: DateTime::from_timestamp(start, 0)?,
                            end: DateTime::from_timestamp(end, 0)?,
                        })
                    });
                    if price_id.is_none() {
                        *price_id = subscription.price_id().map(str::to_string);
                    }
                }
                Err(e) => tracing::warn!(
                    provider_subscription_id = %provider_subscription_id,
                    error = %e,
                    "Failed to fetch subscription details"
                ),
            }
        }
    }

    PaymentEvent::CheckoutCompleted(completed)
}
