//! Checkout creation handlers.
//!
//! These only create a hosted Stripe Checkout session; nothing is written to
//! the ledger until the webhook (or the verification endpoint) confirms payment.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::stripe::{CheckoutMode, CheckoutRequest, LineItem};

/// Subscribe to a plan.
#[derive(Debug, Deserialize)]
pub struct SubscriptionCheckoutRequest {
    /// Catalog plan id.
    pub plan_id: String,
}

/// Buy a credit package.
#[derive(Debug, Deserialize)]
pub struct CreditCheckoutRequest {
    /// Catalog package id.
    pub package_id: String,
}

/// Buy a single document.
#[derive(Debug, Deserialize)]
pub struct DocumentCheckoutRequest {
    /// Catalog document type.
    pub document_type: String,
}

/// Checkout response.
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    /// Hosted checkout URL to redirect the user to.
    pub checkout_url: String,
    /// Stripe session ID.
    pub session_id: String,
}

/// Start a subscription checkout.
pub async fn create_subscription_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<SubscriptionCheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let catalog = &state.config.catalog;
    let plan = catalog.plan(&body.plan_id)?;

    let line_item = match &plan.price_id {
        Some(price_id) => LineItem::Price {
            price_id: price_id.clone(),
        },
        None => LineItem::Inline {
            currency: catalog.currency.clone(),
            name: format!("{} plan", plan.name),
            description: Some(format!(
                "{} documents per {}",
                plan.documents_limit,
                plan.interval.as_str()
            )),
            unit_amount: plan.price_cents,
            recurring: Some(plan.interval),
        },
    };

    let request = checkout_request(
        &state,
        &auth,
        CheckoutMode::Subscription,
        line_item,
        vec![
            ("type".into(), "subscription".into()),
            ("plan_id".into(), plan.id.clone()),
        ],
    );
    create_session(&state, &request).await
}

/// Start a credit package checkout.
pub async fn create_credit_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreditCheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let catalog = &state.config.catalog;
    let package = catalog.credit_package(&body.package_id)?;

    let request = checkout_request(
        &state,
        &auth,
        CheckoutMode::Payment,
        LineItem::Inline {
            currency: catalog.currency.clone(),
            name: package.name.clone(),
            description: Some(format!("{} document credits", package.credits)),
            unit_amount: package.price_cents,
            recurring: None,
        },
        vec![
            ("type".into(), "credits".into()),
            ("package_id".into(), package.id.clone()),
            ("credits".into(), package.credits.to_string()),
        ],
    );
    create_session(&state, &request).await
}

/// Start a single-document checkout.
pub async fn create_document_checkout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<DocumentCheckoutRequest>,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let catalog = &state.config.catalog;
    let document = catalog.document(&body.document_type)?;

    let request = checkout_request(
        &state,
        &auth,
        CheckoutMode::Payment,
        LineItem::Inline {
            currency: catalog.currency.clone(),
            name: document.name.clone(),
            description: Some(document.description.clone()),
            unit_amount: document.price_cents,
            recurring: None,
        },
        vec![
            ("type".into(), "document".into()),
            ("document_type".into(), document.document_type.clone()),
        ],
    );
    create_session(&state, &request).await
}

fn checkout_request(
    state: &AppState,
    auth: &AuthUser,
    mode: CheckoutMode,
    line_item: LineItem,
    mut metadata: Vec<(String, String)>,
) -> CheckoutRequest {
    metadata.insert(0, ("user_id".into(), auth.user_id.to_string()));
    CheckoutRequest {
        mode,
        user_id: auth.user_id.to_string(),
        line_item,
        metadata,
        success_url: state.config.checkout_success_url(),
        cancel_url: state.config.checkout_cancel_url(),
    }
}

async fn create_session(
    state: &AppState,
    request: &CheckoutRequest,
) -> Result<Json<CheckoutResponse>, ApiError> {
    let stripe = state
        .stripe
        .as_ref()
        .ok_or_else(|| ApiError::ExternalService("Stripe not configured".into()))?;

    let session = stripe
        .create_checkout_session(request)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %request.user_id, error = %e, "Failed to create checkout session");
            ApiError::ExternalService(format!("Failed to create checkout session: {e}"))
        })?;

    let checkout_url = session
        .url
        .ok_or_else(|| ApiError::ExternalService("Stripe returned no checkout URL".into()))?;

    tracing::info!(
        user_id = %request.user_id,
        session_id = %session.id,
        "Checkout session created"
    );

    Ok(Json(CheckoutResponse {
        checkout_url,
        session_id: session.id,
    }))
}
