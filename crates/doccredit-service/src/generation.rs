//! The generation permit.
//!
//! The document generator asks for a permit before producing a document. A
//! permit means one unit has already been debited under the caller's
//! idempotency key; a denial means generation must not happen.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use doccredit_core::{
    ConsumeOutcome, ConsumptionRecord, DenialReason, Entitlement, Resource, UserId,
};
use doccredit_store::Store;

/// Result of a permit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationDecision {
    /// One unit is consumed for this key.
    Permit(ConsumptionRecord),
    /// Generation must not proceed.
    Deny(DenialReason),
}

/// Wire shape of a `GenerationDecision`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitResponse {
    /// Whether generation may proceed.
    pub permit: bool,
    /// Debited pool (`resource`, plus `subscription_id` for subscriptions).
    #[serde(flatten)]
    pub resource: Option<Resource>,
    /// Units left in the debited pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
    /// The caller's key, echoed on permits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Why generation was denied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl From<GenerationDecision> for PermitResponse {
    fn from(decision: GenerationDecision) -> Self {
        match decision {
            GenerationDecision::Permit(record) => Self {
                permit: true,
                resource: Some(record.resource),
                remaining: Some(record.remaining),
                idempotency_key: Some(record.idempotency_key),
                reason: None,
            },
            GenerationDecision::Deny(reason) => Self {
                permit: false,
                resource: None,
                remaining: None,
                idempotency_key: None,
                reason: Some(reason),
            },
        }
    }
}

/// Decide whether `user_id` may generate a document under `idempotency_key`.
///
/// Store failures deny with `evaluation-error`; this never grants on doubt.
pub fn request_generation(
    store: &dyn Store,
    user_id: &UserId,
    idempotency_key: &str,
    now: DateTime<Utc>,
) -> GenerationDecision {
    match decide(store, user_id, idempotency_key, now) {
        Ok(decision) => {
            match &decision {
                GenerationDecision::Permit(record) => tracing::debug!(
                    user_id = %user_id,
                    idempotency_key = %idempotency_key,
                    resource = record.resource.as_str(),
                    remaining = record.remaining,
                    "Generation permitted"
                ),
                GenerationDecision::Deny(reason) => tracing::info!(
                    user_id = %user_id,
                    idempotency_key = %idempotency_key,
                    reason = reason.as_str(),
                    "Generation denied"
                ),
            }
            decision
        }
        Err(e) => {
            tracing::error!(
                user_id = %user_id,
                idempotency_key = %idempotency_key,
                error = %e,
                "Entitlement could not be evaluated"
            );
            GenerationDecision::Deny(DenialReason::EvaluationError)
        }
    }
}

fn decide(
    store: &dyn Store,
    user_id: &UserId,
    idempotency_key: &str,
    now: DateTime<Utc>,
) -> doccredit_store::Result<GenerationDecision> {
    if let Some(record) = store.get_consumption(user_id, idempotency_key)? {
        return Ok(GenerationDecision::Permit(record));
    }

    if let Entitlement::Denied(reason) = store.evaluate(user_id, now)? {
        return Ok(GenerationDecision::Deny(reason));
    }

    Ok(match store.consume(user_id, idempotency_key, now)? {
        ConsumeOutcome::Consumed(record) => GenerationDecision::Permit(record),
        ConsumeOutcome::Rejected { reason } => GenerationDecision::Deny(reason),
    })
}
