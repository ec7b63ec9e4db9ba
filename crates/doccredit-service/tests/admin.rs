//! Admin credit grant integration tests.

mod common;

use serde_json::json;

use common::{TestHarness, ADMIN_API_KEY, SERVICE_API_KEY};
use doccredit_core::UserId;
use doccredit_store::Store;

#[tokio::test]
async fn grant_credits_success() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();

    let response = harness
        .server
        .post("/v1/admin/credits/grant")
        .add_header("x-admin-key", ADMIN_API_KEY)
        .add_header("x-admin-id", "support-1")
        .json(&json!({
            "user_id": user_id.to_string(),
            "credits": 2,
            "reason": "Refund for failed generation"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits_granted"], 2);
    assert_eq!(body["balance"], 2);
    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 2);
}

#[tokio::test]
async fn grant_credits_rejects_service_key() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/admin/credits/grant")
        .add_header("x-admin-key", SERVICE_API_KEY)
        .json(&json!({
            "user_id": UserId::generate().to_string(),
            "credits": 2,
            "reason": "nope"
        }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn grant_credits_validates_input() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();

    for body in [
        json!({ "user_id": user_id.to_string(), "credits": 0, "reason": "zero" }),
        json!({ "user_id": user_id.to_string(), "credits": 1, "reason": "  " }),
    ] {
        harness
            .server
            .post("/v1/admin/credits/grant")
            .add_header("x-admin-key", ADMIN_API_KEY)
            .json(&body)
            .await
            .assert_status_bad_request();
    }

    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 0);
}
