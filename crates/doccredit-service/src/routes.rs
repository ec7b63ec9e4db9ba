//! Router configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{admin, catalog, checkout, generation, health, ledger, payments, webhooks};
use crate::state::AppState;

/// Maximum concurrent requests for the generation permit.
const GENERATION_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
/// - `GET /v1/catalog` - Plans, credit packages and document prices
///
/// ## User (JWT auth)
/// - `GET /v1/ledger` - Credits, active subscription and entitlement
/// - `GET /v1/transactions` - Audit history
/// - `GET /v1/subscriptions` - Subscription history
/// - `GET /v1/documents` - Single-document purchases
/// - `POST /v1/checkout/{subscription,credits,document}` - Start a checkout
/// - `POST /v1/payments/verify` - Confirm a checkout after redirect
///
/// ## Document generator (Service API Key auth)
/// - `POST /v1/generation/permit` - Consume one unit for a generation
///
/// ## Admin (Admin API Key auth)
/// - `POST /v1/admin/credits/grant` - Manual credit grant
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/stripe` - Stripe webhooks
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    let generation_routes = Router::new()
        .route("/permit", post(generation::request_permit))
        .layer(ConcurrencyLimitLayer::new(GENERATION_MAX_CONCURRENT_REQUESTS));

    let api_routes = Router::new()
        .route("/catalog", get(catalog::get_catalog))
        // Ledger views
        .route("/ledger", get(ledger::get_ledger))
        .route("/transactions", get(ledger::list_transactions))
        .route("/subscriptions", get(ledger::list_subscriptions))
        .route("/documents", get(ledger::list_documents))
        // Checkout
        .route(
            "/checkout/subscription",
            post(checkout::create_subscription_checkout),
        )
        .route("/checkout/credits", post(checkout::create_credit_checkout))
        .route("/checkout/document", post(checkout::create_document_checkout))
        .route("/payments/verify", post(payments::verify_payment))
        // Admin
        .route("/admin/credits/grant", post(admin::grant_credits))
        .nest("/generation", generation_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - Stripe retries on failure)
        .route("/webhooks/stripe", post(webhooks::stripe_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
