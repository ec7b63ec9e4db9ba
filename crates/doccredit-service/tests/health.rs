//! Health endpoint integration tests.

mod common;

use common::TestHarness;

#[tokio::test]
async fn health_check_returns_ok() {
    let harness = TestHarness::new();

    let response = harness.server.get("/health").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "doccredit");
}

#[tokio::test]
async fn health_check_survives_store_outage() {
    let harness = TestHarness::new();
    harness.outage();

    harness.server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn catalog_is_public() {
    let harness = TestHarness::new();

    let response = harness.server.get("/v1/catalog").await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["plans"]
        .as_array()
        .unwrap()
        .iter()
        .any(|p| p["id"] == "basic-monthly"));
    assert!(!body["credit_packages"].as_array().unwrap().is_empty());
}
