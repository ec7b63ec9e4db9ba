//! Stripe webhook reconciliation integration tests.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::json;

use common::{
    credit_session, event, renewal_invoice, sign, subscription_session, TestHarness,
};
use doccredit_core::{SubscriptionStatus, TransactionStatus, UserId};
use doccredit_store::Store;

// ============================================================================
// Signature
// ============================================================================

#[tokio::test]
async fn missing_signature_is_rejected() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let payload = event(
        "evt_1",
        "checkout.session.completed",
        credit_session("cs_nosig", &user_id, "small-pack"),
    );

    let response = harness
        .server
        .post("/webhooks/stripe")
        .text(payload.to_string())
        .await;

    response.assert_status_bad_request();
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "invalid_signature");
    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 0);
}

#[tokio::test]
async fn tampered_payload_is_rejected() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let original = event(
        "evt_1",
        "checkout.session.completed",
        credit_session("cs_tamper", &user_id, "small-pack"),
    )
    .to_string();
    let signature = sign(&original, Utc::now().timestamp());
    let tampered = original.replace("small-pack", "large-pack");

    harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", signature)
        .text(tampered)
        .await
        .assert_status_bad_request();

    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 0);
}

#[tokio::test]
async fn stale_signature_is_rejected() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let payload = event(
        "evt_1",
        "checkout.session.completed",
        credit_session("cs_stale", &user_id, "small-pack"),
    )
    .to_string();
    let signature = sign(&payload, Utc::now().timestamp() - 3600);

    harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", signature)
        .text(payload)
        .await
        .assert_status_bad_request();
}

// ============================================================================
// Checkout
// ============================================================================

#[tokio::test]
async fn credit_checkout_grants_package_once() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let payload = event(
        "evt_1",
        "checkout.session.completed",
        credit_session("cs_credits", &user_id, "small-pack"),
    );

    let first = harness.webhook(&payload).await;
    first.assert_status_ok();
    let body: serde_json::Value = first.json();
    assert_eq!(body["received"], true);
    assert_eq!(body["status"], "processed");
    assert_eq!(body["event_id"], "evt_1");

    // Stripe redelivers the same event.
    let second = harness.webhook(&payload).await;
    second.assert_status_ok();
    let body: serde_json::Value = second.json();
    assert_eq!(body["status"], "duplicate");

    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 5);
    let transactions = harness
        .store
        .list_transactions_by_user(&user_id, 10, 0)
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].provider_session_id, "cs_credits");
    assert_eq!(transactions[0].status, TransactionStatus::Completed);
}

#[tokio::test]
async fn unpaid_checkout_is_pending_and_grants_nothing() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let mut session = credit_session("cs_123", &user_id, "small-pack");
    session["payment_status"] = json!("unpaid");

    let response = harness
        .webhook(&event("evt_1", "checkout.session.completed", session))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "pending");
    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 0);
    assert!(harness
        .store
        .get_transaction_by_session("cs_123")
        .unwrap()
        .is_none());

    let response = harness
        .webhook(&event(
            "evt_2",
            "checkout.session.completed",
            credit_session("cs_456", &user_id, "small-pack"),
        ))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "processed");
    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 5);
    let transactions = harness
        .store
        .list_transactions_by_user(&user_id, 10, 0)
        .unwrap();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].provider_session_id, "cs_456");
    assert!(harness
        .store
        .get_transaction_by_session("cs_123")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn paid_checkout_for_unknown_product_is_acknowledged() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();

    let response = harness
        .webhook(&event(
            "evt_1",
            "checkout.session.completed",
            credit_session("cs_nopack", &user_id, "no-such-pack"),
        ))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "inconsistent");

    let response = harness
        .webhook(&event(
            "evt_2",
            "checkout.session.completed",
            subscription_session("cs_noplan", &user_id, "no-such-plan", "sub_noplan"),
        ))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "inconsistent");

    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 0);
    assert!(harness
        .store
        .get_active_subscription(&user_id, Utc::now())
        .unwrap()
        .is_none());
    assert!(harness
        .store
        .list_transactions_by_user(&user_id, 10, 0)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn async_payment_failure_is_recorded_without_grant() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let mut session = credit_session("cs_failed", &user_id, "small-pack");
    session["payment_status"] = json!("unpaid");

    let response = harness
        .webhook(&event("evt_1", "checkout.session.async_payment_failed", session))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "failed");
    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 0);
    let tx = harness
        .store
        .get_transaction_by_session("cs_failed")
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Failed);
}

#[tokio::test]
async fn document_checkout_records_purchase() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let session = json!({
        "id": "cs_doc",
        "mode": "payment",
        "payment_status": "paid",
        "amount_total": 999,
        "currency": "usd",
        "metadata": {
            "user_id": user_id.to_string(),
            "type": "document",
            "document_type": "contract",
        }
    });

    harness
        .webhook(&event("evt_1", "checkout.session.completed", session))
        .await
        .assert_status_ok();

    let documents = harness.store.list_purchased_documents(&user_id).unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].document_type, "contract");
    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 0);
}

#[tokio::test]
async fn unknown_event_type_is_ignored() {
    let harness = TestHarness::new();

    let response = harness
        .webhook(&event("evt_1", "customer.created", json!({ "id": "cus_1" })))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ignored");
}

#[tokio::test]
async fn signed_garbage_is_acknowledged() {
    let harness = TestHarness::new();
    let payload = "not json";

    let response = harness
        .server
        .post("/webhooks/stripe")
        .add_header("stripe-signature", sign(payload, Utc::now().timestamp()))
        .text(payload)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "invalid");
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn renewal_resets_allowance() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();

    harness
        .webhook(&event(
            "evt_1",
            "checkout.session.completed",
            subscription_session("cs_sub", &user_id, "basic-monthly", "sub_123"),
        ))
        .await
        .assert_status_ok();

    // Spend part of the allowance.
    for i in 0..3 {
        let permit = harness.permit(&user_id, &format!("draft-{i}")).await;
        assert_eq!(permit["permit"], true);
    }
    let subscription = harness
        .store
        .find_subscription_by_provider_id("sub_123")
        .unwrap()
        .unwrap();
    assert_eq!(subscription.documents_remaining, 7);

    let start = subscription.current_period_end;
    let end = start + Duration::days(30);
    let response = harness
        .webhook(&event(
            "evt_2",
            "invoice.paid",
            renewal_invoice("in_renewal", "sub_123", start.timestamp(), end.timestamp()),
        ))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "processed");

    let renewed = harness
        .store
        .find_subscription_by_provider_id("sub_123")
        .unwrap()
        .unwrap();
    assert_eq!(renewed.id, subscription.id);
    assert_eq!(renewed.documents_remaining, 10);
    assert_eq!(renewed.current_period_end.timestamp(), end.timestamp());
}

#[tokio::test]
async fn cancellation_revokes_allowance_and_blocks_renewal() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();

    harness
        .webhook(&event(
            "evt_1",
            "checkout.session.completed",
            subscription_session("cs_sub", &user_id, "basic-monthly", "sub_cancel"),
        ))
        .await
        .assert_status_ok();

    let response = harness
        .webhook(&event(
            "evt_2",
            "customer.subscription.deleted",
            json!({ "id": "sub_cancel", "status": "canceled" }),
        ))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "canceled");

    let permit = harness.permit(&user_id, "after-cancel").await;
    assert_eq!(permit["permit"], false);
    assert_eq!(permit["reason"], "no-resources");

    // A late renewal must not revive it.
    let end = Utc::now() + Duration::days(60);
    let response = harness
        .webhook(&event(
            "evt_3",
            "invoice.paid",
            renewal_invoice("in_late", "sub_cancel", Utc::now().timestamp(), end.timestamp()),
        ))
        .await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "skipped");

    let subscription = harness
        .store
        .find_subscription_by_provider_id("sub_cancel")
        .unwrap()
        .unwrap();
    assert_eq!(subscription.status, SubscriptionStatus::Canceled);
    assert!(harness
        .store
        .get_transaction_by_session("in_late")
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn renewal_for_unknown_subscription_is_acknowledged() {
    let harness = TestHarness::new();
    let now = Utc::now();

    let response = harness
        .webhook(&event(
            "evt_1",
            "invoice.paid",
            renewal_invoice(
                "in_orphan",
                "sub_unknown",
                now.timestamp(),
                (now + Duration::days(30)).timestamp(),
            ),
        ))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "inconsistent");
}

#[tokio::test]
async fn first_invoice_is_left_to_checkout() {
    let harness = TestHarness::new();
    let now = Utc::now();
    let mut invoice = renewal_invoice(
        "in_first",
        "sub_123",
        now.timestamp(),
        (now + Duration::days(30)).timestamp(),
    );
    invoice["billing_reason"] = json!("subscription_create");

    let response = harness
        .webhook(&event("evt_1", "invoice.paid", invoice))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "ignored");
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn store_outage_asks_stripe_to_retry() {
    let harness = TestHarness::new();
    let user_id = UserId::generate();
    let payload = event(
        "evt_1",
        "checkout.session.completed",
        credit_session("cs_retry", &user_id, "small-pack"),
    );

    harness.outage();
    let response = harness.webhook(&payload).await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    harness.restore();

    // The retry succeeds and applies exactly once.
    let response = harness.webhook(&payload).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "processed");
    assert_eq!(harness.store.get_balance(&user_id).unwrap().credits, 5);
}
