//! Post-checkout payment verification.
//!
//! The frontend calls this after the Stripe redirect. It is safe to call any
//! number of times: a recorded transaction is returned as-is, otherwise the
//! session is fetched and pushed through the same reconciler as the webhook.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use doccredit_core::{PaymentEvent, Transaction, TransactionStatus};
use doccredit_store::Store;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::reconcile::ReconcileOutcome;
use crate::state::AppState;
use crate::stripe::checkout_completed;

/// Verify request.
#[derive(Debug, Deserialize)]
pub struct VerifyPaymentRequest {
    /// Stripe checkout session id (`cs_...`).
    pub session_id: String,
}

/// Resolved payment outcome.
#[derive(Debug, Serialize)]
pub struct VerifyPaymentResponse {
    /// `completed`, `pending` or `failed`.
    pub status: &'static str,
    /// The session asked about.
    pub session_id: String,
    /// The recorded transaction, once there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
    /// Extra context for pending sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl VerifyPaymentResponse {
    fn recorded(transaction: Transaction) -> Self {
        let status = match transaction.status {
            TransactionStatus::Completed => "completed",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Failed | TransactionStatus::Refunded => "failed",
        };
        Self {
            status,
            session_id: transaction.provider_session_id.clone(),
            transaction: Some(transaction),
            details: None,
        }
    }

    fn pending(session_id: String, details: impl Into<String>) -> Self {
        Self {
            status: "pending",
            session_id,
            transaction: None,
            details: Some(details.into()),
        }
    }
}

/// Verify a checkout session for the signed-in user.
pub async fn verify_payment(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>, ApiError> {
    let session_id = body.session_id.trim().to_string();
    if !session_id.starts_with("cs_") {
        return Err(ApiError::BadRequest("session_id must be a checkout session id".into()));
    }

    if let Some(transaction) = owned_transaction(state.store.as_ref(), &auth, &session_id)? {
        return Ok(Json(VerifyPaymentResponse::recorded(transaction)));
    }

    let Some(stripe) = &state.stripe else {
        return Ok(Json(VerifyPaymentResponse::pending(
            session_id,
            "payment not confirmed yet",
        )));
    };

    let session = stripe
        .get_checkout_session(&session_id)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ApiError::NotFound(format!("checkout session not found: {session_id}"))
            } else {
                tracing::error!(session_id = %session_id, error = %e, "Failed to fetch checkout session");
                ApiError::ExternalService(format!("Failed to fetch checkout session: {e}"))
            }
        })?;

    let event = checkout_completed(&session).map_err(|e| {
        tracing::warn!(session_id = %session_id, error = %e, "Checkout session not reconcilable");
        ApiError::BadRequest(format!("checkout session cannot be verified: {e}"))
    })?;

    // Someone else's session looks the same as a missing one.
    if event.user_id != auth.user_id {
        return Err(ApiError::NotFound(format!(
            "checkout session not found: {session_id}"
        )));
    }

    let outcome = state
        .reconciler()
        .reconcile(&PaymentEvent::CheckoutCompleted(event), Utc::now())?;

    match outcome {
        ReconcileOutcome::Applied(_) | ReconcileOutcome::Duplicate | ReconcileOutcome::Failed => {
            let transaction = owned_transaction(state.store.as_ref(), &auth, &session_id)?
                .ok_or_else(|| {
                    ApiError::Internal(format!("transaction missing after reconcile: {session_id}"))
                })?;
            Ok(Json(VerifyPaymentResponse::recorded(transaction)))
        }
        ReconcileOutcome::Inconsistent(detail) => {
            Ok(Json(VerifyPaymentResponse::pending(session_id, detail)))
        }
        other => Ok(Json(VerifyPaymentResponse::pending(
            session_id,
            format!(
                "payment status {}",
                session.payment_status.as_deref().unwrap_or(other.status())
            ),
        ))),
    }
}

/// The session's transaction, if it exists and belongs to the caller.
fn owned_transaction(
    store: &dyn Store,
    auth: &AuthUser,
    session_id: &str,
) -> Result<Option<Transaction>, ApiError> {
    match store.get_transaction_by_session(session_id)? {
        Some(tx) if tx.user_id == auth.user_id => Ok(Some(tx)),
        Some(_) => Err(ApiError::NotFound(format!(
            "checkout session not found: {session_id}"
        ))),
        None => Ok(None),
    }
}
