mod common;

use axum::http::{Method, StatusCode};
use certpay_api::gateway::CancelScope;
use certpay_api::services::notifications::PaymentEventKind;
use common::{read_json, GatewayCall, TestApp};
use serde_json::json;

const CANCEL: &str = "/api/v1/payments/cancel";
const WEBHOOK: &str = "/api/v1/payments/webhook";

async fn paid_application(app: &TestApp) -> String {
    let order_id = app.submit_application(&["심리상담사1급"]).await;
    app.post_form(
        WEBHOOK,
        &[
            ("state", "1"),
            ("tradeid", "T1001"),
            ("mul_no", "90001"),
            ("var1", &order_id),
        ],
    )
    .await;
    assert_eq!(app.payment_status(&order_id).await, "paid");
    order_id
}

#[tokio::test]
async fn full_cancel_moves_record_to_cancelled() {
    let app = TestApp::new().await;
    let order_id = paid_application(&app).await;

    let response = app
        .request(
            Method::POST,
            CANCEL,
            Some(json!({
                "order_id": order_id,
                "cancel_type": "full",
                "reason": "고객 요청"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(app.payment_status(&order_id).await, "cancelled");

    let actions = app.audit_actions(&order_id).await;
    assert_eq!(actions.last().map(String::as_str), Some("payment_cancelled"));

    let events = app.notifier.events();
    assert_eq!(events.last().map(|e| e.kind), Some(PaymentEventKind::Cancelled));
}

#[tokio::test]
async fn partial_cancel_keeps_amount_within_bounds() {
    let app = TestApp::new().await;
    let order_id = paid_application(&app).await;

    // Over the recorded amount: rejected before any gateway call.
    let response = app
        .request(
            Method::POST,
            CANCEL,
            Some(json!({
                "order_id": order_id,
                "cancel_type": "partial",
                "amount": 150_000
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.cancel_call_count(), 0);
    assert_eq!(app.payment_status(&order_id).await, "paid");

    // Within bounds: goes through as a partial scope.
    let response = app
        .request(
            Method::POST,
            CANCEL,
            Some(json!({
                "order_id": order_id,
                "cancel_type": "partial",
                "amount": 50_000
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let calls = app.gateway.calls();
    assert!(matches!(
        calls.last(),
        Some(GatewayCall::Cancel {
            scope: CancelScope::Partial(50_000),
            ..
        })
    ));
    assert_eq!(app.payment_status(&order_id).await, "cancelled");
}

#[tokio::test]
async fn partial_cancel_without_amount_is_rejected() {
    let app = TestApp::new().await;
    let order_id = paid_application(&app).await;

    let response = app
        .request(
            Method::POST,
            CANCEL,
            Some(json!({
                "order_id": order_id,
                "cancel_type": "partial"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.cancel_call_count(), 0);
}

#[tokio::test]
async fn cancellation_request_leaves_record_paid() {
    let app = TestApp::new().await;
    let order_id = paid_application(&app).await;

    let response = app
        .request(
            Method::POST,
            CANCEL,
            Some(json!({
                "order_id": order_id,
                "cancel_type": "request",
                "reason": "정산 후 환불"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["status"], "pending");

    // The refund is asynchronous; the record only moves when PayApp confirms.
    assert_eq!(app.payment_status(&order_id).await, "paid");

    let actions = app.audit_actions(&order_id).await;
    assert_eq!(
        actions.last().map(String::as_str),
        Some("cancellation_requested")
    );
}

#[tokio::test]
async fn pending_application_cannot_be_cancelled() {
    let app = TestApp::new().await;
    let order_id = app.submit_application(&["심리상담사1급"]).await;

    let response = app
        .request(
            Method::POST,
            CANCEL,
            Some(json!({
                "order_id": order_id,
                "cancel_type": "full"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.gateway.cancel_call_count(), 0);
    assert_eq!(app.payment_status(&order_id).await, "pending");
}

#[tokio::test]
async fn unknown_order_cancellation_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            CANCEL,
            Some(json!({
                "order_id": "CERT-00000000000000-XXXXXX",
                "cancel_type": "full"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn gateway_refusal_keeps_record_paid() {
    let app = TestApp::new().await;
    let order_id = paid_application(&app).await;
    app.gateway.set_fail_cancels(true);

    let response = app
        .request(
            Method::POST,
            CANCEL,
            Some(json!({
                "order_id": order_id,
                "cancel_type": "full"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(app.payment_status(&order_id).await, "paid");

    // The refusal is recorded in the cancellation history.
    let rows = app
        .state
        .services
        .cancellations
        .list(&order_id)
        .await
        .unwrap();
    assert_eq!(rows.first().map(|r| r.status.as_str()), Some("rejected"));

    // The refusal also lands in the audit trail.
    let actions = app.audit_actions(&order_id).await;
    assert_eq!(
        actions.last().map(String::as_str),
        Some("cancel_full_failed")
    );
}

#[tokio::test]
async fn refused_cancellation_request_is_audited() {
    let app = TestApp::new().await;
    let order_id = paid_application(&app).await;
    app.gateway.set_fail_cancels(true);

    let response = app
        .request(
            Method::POST,
            CANCEL,
            Some(json!({
                "order_id": order_id,
                "cancel_type": "request"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(app.payment_status(&order_id).await, "paid");

    let actions = app.audit_actions(&order_id).await;
    assert_eq!(
        actions.last().map(String::as_str),
        Some("cancel_request_failed")
    );
}

#[tokio::test]
async fn stray_failure_signal_after_cancel_changes_nothing() {
    let app = TestApp::new().await;
    let order_id = paid_application(&app).await;

    app.request(
        Method::POST,
        CANCEL,
        Some(json!({ "order_id": order_id, "cancel_type": "full" })),
    )
    .await;
    assert_eq!(app.payment_status(&order_id).await, "cancelled");

    let response = app
        .post_form(
            WEBHOOK,
            &[("state", "0"), ("var1", &order_id), ("message", "뒤늦은 실패")],
        )
        .await;

    // Acknowledged so the gateway stops retrying, but the record stays put.
    assert_eq!(common::read_text(response).await, "SUCCESS");
    assert_eq!(app.payment_status(&order_id).await, "cancelled");

    let actions = app.audit_actions(&order_id).await;
    assert_eq!(actions.last().map(String::as_str), Some("conflicting_signal"));
}

#[tokio::test]
async fn cancellation_history_is_listed() {
    let app = TestApp::new().await;
    let order_id = paid_application(&app).await;

    app.request(
        Method::POST,
        CANCEL,
        Some(json!({ "order_id": order_id, "cancel_type": "full" })),
    )
    .await;

    let response = app
        .request(
            Method::GET,
            &format!("{}?order_id={}", CANCEL, order_id),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let rows = body["data"].as_array().expect("cancellation list");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["cancel_type"], "full");
    assert_eq!(rows[0]["status"], "approved");
}
