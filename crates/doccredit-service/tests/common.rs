//! Common test utilities for doccredit integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::{TestResponse, TestServer};
use chrono::{Duration, Utc};
use serde_json::{json, Value};

use doccredit_core::UserId;
use doccredit_service::crypto::hmac_sha256_hex;
use doccredit_service::{create_router, AppState, ServiceConfig, StripeClient};
use doccredit_store::MemoryStore;

pub const SERVICE_API_KEY: &str = "test-service-key";
pub const ADMIN_API_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The store behind the server, for direct inspection and outages.
    pub store: Arc<MemoryStore>,
    /// A test user ID for authenticated requests.
    pub test_user_id: UserId,
}

impl TestHarness {
    /// Create a new test harness with an empty ledger and no Stripe client.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a harness whose Stripe client points at `base_url`.
    pub fn with_stripe(base_url: &str) -> Self {
        let client =
            StripeClient::with_base_url("sk_test_123", base_url).expect("Failed to build client");
        Self::build(Some(client))
    }

    fn build(stripe: Option<StripeClient>) -> Self {
        let store = Arc::new(MemoryStore::new());

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: String::new(),
            service_api_key: Some(SERVICE_API_KEY.into()),
            admin_api_key: Some(ADMIN_API_KEY.into()),
            stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
            ..ServiceConfig::default()
        };

        let mut state = AppState::new(store.clone(), config);
        if let Some(client) = stripe {
            state = state.with_stripe(client);
        }
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            store,
            test_user_id: UserId::generate(),
        }
    }

    /// Get the authorization header for user authentication.
    pub fn user_auth_header(&self) -> String {
        format!("Bearer test-token:{}", self.test_user_id)
    }

    /// Get a different user's auth header (for testing isolation).
    pub fn other_user_auth_header() -> String {
        format!("Bearer test-token:{}", UserId::generate())
    }

    /// Make every store operation fail until `restore` is called.
    pub fn outage(&self) {
        self.store.backend().set_available(false);
    }

    /// End a simulated outage.
    pub fn restore(&self) {
        self.store.backend().set_available(true);
    }

    /// Deliver a correctly signed Stripe webhook.
    pub async fn webhook(&self, event: &Value) -> TestResponse {
        let payload = event.to_string();
        let signature = sign(&payload, Utc::now().timestamp());
        self.server
            .post("/webhooks/stripe")
            .add_header("stripe-signature", signature)
            .text(payload)
            .await
    }

    /// Request a generation permit as the document generator.
    pub async fn permit(&self, user_id: &UserId, key: &str) -> Value {
        let response = self
            .server
            .post("/v1/generation/permit")
            .add_header("x-api-key", SERVICE_API_KEY)
            .add_header("x-service-name", "doc-generator")
            .json(&json!({
                "user_id": user_id.to_string(),
                "idempotency_key": key,
            }))
            .await;
        response.assert_status_ok();
        response.json()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Stripe-style signature header for `payload` signed at `timestamp`.
pub fn sign(payload: &str, timestamp: i64) -> String {
    let mac = hmac_sha256_hex(WEBHOOK_SECRET, &format!("{timestamp}.{payload}"))
        .expect("hmac accepts any key length");
    format!("t={timestamp},v1={mac}")
}

/// Wrap an object in a webhook event envelope.
pub fn event(id: &str, event_type: &str, object: Value) -> Value {
    json!({
        "id": id,
        "type": event_type,
        "created": Utc::now().timestamp(),
        "data": { "object": object }
    })
}

/// A paid credit-package checkout session.
pub fn credit_session(session_id: &str, user_id: &UserId, package_id: &str) -> Value {
    json!({
        "id": session_id,
        "object": "checkout.session",
        "mode": "payment",
        "payment_status": "paid",
        "status": "complete",
        "amount_total": 499,
        "currency": "usd",
        "client_reference_id": user_id.to_string(),
        "metadata": {
            "user_id": user_id.to_string(),
            "type": "credits",
            "package_id": package_id,
        }
    })
}

/// A paid subscription checkout session with the subscription expanded.
pub fn subscription_session(
    session_id: &str,
    user_id: &UserId,
    plan_id: &str,
    provider_subscription_id: &str,
) -> Value {
    let start = Utc::now() - Duration::days(1);
    let end = start + Duration::days(30);
    json!({
        "id": session_id,
        "object": "checkout.session",
        "mode": "subscription",
        "payment_status": "paid",
        "status": "complete",
        "amount_total": 999,
        "currency": "usd",
        "metadata": {
            "user_id": user_id.to_string(),
            "type": "subscription",
            "plan_id": plan_id,
        },
        "subscription": {
            "id": provider_subscription_id,
            "status": "active",
            "current_period_start": start.timestamp(),
            "current_period_end": end.timestamp(),
        }
    })
}

/// A paid renewal invoice for `provider_subscription_id`.
pub fn renewal_invoice(
    invoice_id: &str,
    provider_subscription_id: &str,
    start: i64,
    end: i64,
) -> Value {
    json!({
        "id": invoice_id,
        "object": "invoice",
        "subscription": provider_subscription_id,
        "amount_paid": 999,
        "currency": "usd",
        "billing_reason": "subscription_cycle",
        "lines": {
            "data": [{ "period": { "start": start, "end": end } }],
            "has_more": false
        }
    })
}
