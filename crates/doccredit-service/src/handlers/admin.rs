//! Admin compensation.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use doccredit_core::UserId;

use crate::auth::AdminAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Grant credits request.
#[derive(Debug, Deserialize)]
pub struct GrantCreditsRequest {
    /// Recipient.
    pub user_id: UserId,
    /// Credits to add.
    pub credits: u64,
    /// Why (e.g. the failed generation being refunded).
    pub reason: String,
}

/// Grant credits response.
#[derive(Debug, Serialize)]
pub struct GrantCreditsResponse {
    /// Recipient.
    pub user_id: String,
    /// Credits added.
    pub credits_granted: u64,
    /// Balance after the grant.
    pub balance: u64,
}

/// Add credits by hand, e.g. to refund a generation that failed after its permit.
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    admin: AdminAuth,
    Json(body): Json<GrantCreditsRequest>,
) -> Result<Json<GrantCreditsResponse>, ApiError> {
    if body.credits == 0 {
        return Err(ApiError::BadRequest("credits must be positive".into()));
    }
    if body.reason.trim().is_empty() {
        return Err(ApiError::BadRequest("reason is required".into()));
    }

    let balance = state.store.increment_credits(&body.user_id, body.credits)?;

    tracing::info!(
        admin_id = %admin.admin_id,
        user_id = %body.user_id,
        credits = body.credits,
        reason = %body.reason,
        balance,
        "Admin granted credits"
    );

    Ok(Json(GrantCreditsResponse {
        user_id: body.user_id.to_string(),
        credits_granted: body.credits,
        balance,
    }))
}
