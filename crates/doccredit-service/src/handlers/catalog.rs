//! Public product catalog.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use doccredit_core::Catalog;

use crate::state::AppState;

/// List plans, credit packages and single-document prices.
pub async fn get_catalog(State(state): State<Arc<AppState>>) -> Json<Catalog> {
    Json(state.config.catalog.clone())
}
