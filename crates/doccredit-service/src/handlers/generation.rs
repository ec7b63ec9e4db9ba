//! Generation permit handler (document generator, API key auth).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use doccredit_core::UserId;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::generation::{request_generation, PermitResponse};
use crate::state::AppState;

/// Longest accepted idempotency key.
const MAX_KEY_LEN: usize = 256;

/// Permit request.
#[derive(Debug, Deserialize)]
pub struct PermitRequest {
    /// User the document is generated for.
    pub user_id: UserId,
    /// Unique per generation attempt (e.g. the draft document id).
    pub idempotency_key: String,
}

/// Request a single-use generation permit.
///
/// Denials are normal results (200); only malformed requests are errors.
pub async fn request_permit(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    Json(body): Json<PermitRequest>,
) -> Result<Json<PermitResponse>, ApiError> {
    let key = body.idempotency_key.trim();
    if key.is_empty() {
        return Err(ApiError::BadRequest("idempotency_key is required".into()));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(ApiError::BadRequest(format!(
            "idempotency_key longer than {MAX_KEY_LEN} bytes"
        )));
    }

    tracing::debug!(
        service = %service.service_name,
        user_id = %body.user_id,
        idempotency_key = %key,
        "Generation permit requested"
    );

    let decision = request_generation(state.store.as_ref(), &body.user_id, key, Utc::now());
    Ok(Json(decision.into()))
}
