//! Read-only ledger views for the signed-in user.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use doccredit_core::{
    DenialReason, Entitlement, PurchasedDocument, Resource, Subscription, SubscriptionStatus,
    Transaction,
};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Default page size for transaction listings.
const DEFAULT_LIMIT: usize = 20;

/// Maximum page size for transaction listings.
const MAX_LIMIT: usize = 100;

/// A subscription row with its status computed at read time.
#[derive(Debug, Serialize)]
pub struct SubscriptionView {
    /// Local subscription id.
    pub id: String,
    /// Stripe subscription id.
    pub provider_subscription_id: String,
    /// Catalog plan id.
    pub plan_id: String,
    /// `active`, `canceled` or `expired`.
    pub status: SubscriptionStatus,
    /// Documents left in the current period.
    pub documents_remaining: u32,
    /// Period start.
    pub current_period_start: DateTime<Utc>,
    /// Period end.
    pub current_period_end: DateTime<Utc>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
}

impl SubscriptionView {
    fn new(subscription: &Subscription, now: DateTime<Utc>) -> Self {
        Self {
            id: subscription.id.to_string(),
            provider_subscription_id: subscription.provider_subscription_id.clone(),
            plan_id: subscription.plan_id.clone(),
            status: subscription.effective_status(now),
            documents_remaining: subscription.documents_remaining,
            current_period_start: subscription.current_period_start,
            current_period_end: subscription.current_period_end,
            created_at: subscription.created_at,
        }
    }
}

/// Current entitlement decision.
#[derive(Debug, Serialize)]
pub struct EntitlementView {
    /// Whether a generation would be permitted now.
    pub can_generate: bool,
    /// Pool that would be debited.
    #[serde(flatten)]
    pub resource: Option<Resource>,
    /// Why not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl From<Entitlement> for EntitlementView {
    fn from(entitlement: Entitlement) -> Self {
        match entitlement {
            Entitlement::Permitted(resource) => Self {
                can_generate: true,
                resource: Some(resource),
                reason: None,
            },
            Entitlement::Denied(reason) => Self {
                can_generate: false,
                resource: None,
                reason: Some(reason),
            },
        }
    }
}

/// Ledger summary.
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    /// User ID.
    pub user_id: String,
    /// Credit balance.
    pub credits: u64,
    /// Active subscription, if any.
    pub subscription: Option<SubscriptionView>,
    /// What a generation request would do right now.
    pub entitlement: EntitlementView,
}

/// Get the user's credits, active subscription and entitlement.
pub async fn get_ledger(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<LedgerResponse>, ApiError> {
    let now = Utc::now();
    let balance = state.store.get_balance(&auth.user_id)?;
    let subscription = state.store.get_active_subscription(&auth.user_id, now)?;
    let entitlement = state.store.evaluate(&auth.user_id, now)?;

    Ok(Json(LedgerResponse {
        user_id: auth.user_id.to_string(),
        credits: balance.credits,
        subscription: subscription.map(|s| SubscriptionView::new(&s, now)),
        entitlement: entitlement.into(),
    }))
}

/// Pagination for transaction listings.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Page size (default 20, max 100).
    #[serde(default)]
    pub limit: Option<usize>,
    /// Rows to skip.
    #[serde(default)]
    pub offset: Option<usize>,
}

/// Transaction page.
#[derive(Debug, Serialize)]
pub struct TransactionsResponse {
    /// Audit rows, newest first.
    pub transactions: Vec<Transaction>,
    /// Whether another page exists.
    pub has_more: bool,
}

/// List the user's audit transactions.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<TransactionsResponse>, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = query.offset.unwrap_or(0);

    // One extra row tells us whether there is a next page.
    let mut transactions = state
        .store
        .list_transactions_by_user(&auth.user_id, limit + 1, offset)?;
    let has_more = transactions.len() > limit;
    transactions.truncate(limit);

    Ok(Json(TransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Subscription history.
#[derive(Debug, Serialize)]
pub struct SubscriptionsResponse {
    /// All rows, newest first.
    pub subscriptions: Vec<SubscriptionView>,
}

/// List every subscription row of the user, including superseded ones.
pub async fn list_subscriptions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<SubscriptionsResponse>, ApiError> {
    let now = Utc::now();
    let subscriptions = state
        .store
        .list_subscriptions_by_user(&auth.user_id)?
        .iter()
        .map(|s| SubscriptionView::new(s, now))
        .collect();

    Ok(Json(SubscriptionsResponse { subscriptions }))
}

/// Purchased documents.
#[derive(Debug, Serialize)]
pub struct DocumentsResponse {
    /// Single-document purchases.
    pub documents: Vec<PurchasedDocument>,
}

/// List the user's single-document purchases.
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<DocumentsResponse>, ApiError> {
    let documents = state.store.list_purchased_documents(&auth.user_id)?;
    Ok(Json(DocumentsResponse { documents }))
}
