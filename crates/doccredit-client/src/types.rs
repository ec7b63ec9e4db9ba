//! Request and response types for the doccredit client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use doccredit_core::{DenialReason, PurchasedDocument, SubscriptionStatus, Transaction};

/// Generation permit request.
#[derive(Debug, Clone, Serialize)]
pub struct PermitRequest {
    /// User the document is generated for.
    pub user_id: String,
    /// Unique per generation attempt.
    pub idempotency_key: String,
}

/// Generation permit decision.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenerationPermit {
    /// Whether generation may proceed.
    pub permit: bool,
    /// `subscription` or `credits`, on permits.
    #[serde(default)]
    pub resource: Option<String>,
    /// Debited subscription, when `resource` is `subscription`.
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Units left in the debited pool.
    #[serde(default)]
    pub remaining: Option<u64>,
    /// Echo of the request key, on permits.
    #[serde(default)]
    pub idempotency_key: Option<String>,
    /// Why generation was denied.
    #[serde(default)]
    pub reason: Option<DenialReason>,
}

impl GenerationPermit {
    /// Whether the denial may clear if retried later (the ledger was unreadable).
    #[must_use]
    pub fn is_transient_denial(&self) -> bool {
        !self.permit && self.reason == Some(DenialReason::EvaluationError)
    }
}

/// Active subscription summary.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionSummary {
    /// Local subscription id.
    pub id: String,
    /// Stripe subscription id.
    pub provider_subscription_id: String,
    /// Catalog plan id.
    pub plan_id: String,
    /// Status at read time.
    pub status: SubscriptionStatus,
    /// Documents left this period.
    pub documents_remaining: u32,
    /// Period start.
    pub current_period_start: DateTime<Utc>,
    /// Period end.
    pub current_period_end: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Entitlement as of the ledger read.
#[derive(Debug, Clone, Deserialize)]
pub struct EntitlementSummary {
    /// Whether a generation would be permitted.
    pub can_generate: bool,
    /// Pool that would be debited.
    #[serde(default)]
    pub resource: Option<String>,
    /// Subscription that would be debited.
    #[serde(default)]
    pub subscription_id: Option<String>,
    /// Why not.
    #[serde(default)]
    pub reason: Option<DenialReason>,
}

/// Ledger summary response.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSummary {
    /// User ID.
    pub user_id: String,
    /// Credit balance.
    pub credits: u64,
    /// Active subscription.
    pub subscription: Option<SubscriptionSummary>,
    /// Current entitlement.
    pub entitlement: EntitlementSummary,
}

/// Transaction page.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionsPage {
    /// Audit rows, newest first.
    pub transactions: Vec<Transaction>,
    /// Whether another page exists.
    pub has_more: bool,
}

/// Purchased documents response.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsResponse {
    /// Single-document purchases.
    pub documents: Vec<PurchasedDocument>,
}

/// Checkout response.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Hosted checkout URL.
    pub checkout_url: String,
    /// Stripe session ID.
    pub session_id: String,
}

/// Payment verification result.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentVerification {
    /// `completed`, `pending` or `failed`.
    pub status: String,
    /// The verified session.
    pub session_id: String,
    /// Recorded transaction, once there is one.
    #[serde(default)]
    pub transaction: Option<Transaction>,
    /// Extra context for pending sessions.
    #[serde(default)]
    pub details: Option<String>,
}

impl PaymentVerification {
    /// Whether the payment has been applied to the ledger.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// API error response.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    /// Error details.
    pub error: ApiErrorBody,
}

/// API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Error message.
    pub message: String,
    /// Additional details.
    pub details: Option<serde_json::Value>,
}
