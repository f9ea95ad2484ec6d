mod common;

use axum::http::{Method, StatusCode};
use common::{read_json, GatewayCall, TestApp};
use serde_json::json;

const APPLICATIONS: &str = "/api/v1/applications";

#[tokio::test]
async fn submission_prices_are_computed_server_side() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            APPLICATIONS,
            Some(json!({
                "name": "홍길동",
                "contact": "01012345678",
                "address_main": "서울특별시 강남구 테헤란로 1",
                "certificates": ["심리상담사1급", "독서지도사1급", "노인심리상담사1급"],
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json(response).await;
    assert_eq!(body["data"]["amount"], 300_000);
    assert_eq!(body["data"]["payment_status"], "pending");
    assert!(body["data"]["pay_url"]
        .as_str()
        .unwrap()
        .starts_with("https://pay.example.test/"));

    // The gateway was asked for exactly that amount.
    let calls = app.gateway.calls();
    assert!(matches!(
        calls.as_slice(),
        [GatewayCall::PayRequest { price: 300_000, .. }]
    ));
}

#[tokio::test]
async fn order_ids_follow_the_cert_prefix_format() {
    let app = TestApp::new().await;
    let order_id = app.submit_application(&["심리상담사1급"]).await;

    assert!(order_id.starts_with("CERT-"));
    assert_eq!(order_id.split('-').count(), 3);
}

#[tokio::test]
async fn unknown_certificate_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            APPLICATIONS,
            Some(json!({
                "name": "홍길동",
                "contact": "01012345678",
                "address_main": "서울특별시 강남구 테헤란로 1",
                "certificates": ["없는자격증"],
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.gateway.calls().is_empty());
}

#[tokio::test]
async fn empty_certificate_selection_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            APPLICATIONS,
            Some(json!({
                "name": "홍길동",
                "contact": "01012345678",
                "address_main": "서울특별시 강남구 테헤란로 1",
                "certificates": [],
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_phone_number_is_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            APPLICATIONS,
            Some(json!({
                "name": "홍길동",
                "contact": "010-1234-5678",
                "address_main": "서울특별시 강남구 테헤란로 1",
                "certificates": ["심리상담사1급"],
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn lookup_by_order_id_returns_the_application() {
    let app = TestApp::new().await;
    let order_id = app.submit_application(&["심리상담사1급", "독서지도사1급"]).await;

    let response = app
        .request(Method::GET, &format!("{}/{}", APPLICATIONS, order_id), None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    assert_eq!(body["data"]["order_id"], order_id);
    assert_eq!(body["data"]["name"], "홍길동");
    assert_eq!(body["data"]["amount"], 200_000);
    assert_eq!(
        body["data"]["certificates"],
        json!(["심리상담사1급", "독서지도사1급"])
    );
}

#[tokio::test]
async fn unknown_order_lookup_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::GET,
            &format!("{}/CERT-00000000000000-XXXXXX", APPLICATIONS),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn audit_trail_endpoint_lists_actions_in_order() {
    let app = TestApp::new().await;
    let order_id = app.submit_application(&["심리상담사1급"]).await;

    app.post_form(
        "/api/v1/payments/webhook",
        &[("state", "1"), ("tradeid", "T1001"), ("var1", &order_id)],
    )
    .await;

    let response = app
        .request(
            Method::GET,
            &format!("{}/{}/logs", APPLICATIONS, order_id),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json(response).await;
    let actions: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|log| log["action"].as_str().unwrap())
        .collect();
    assert_eq!(actions, vec!["payment_requested", "payment_success"]);
}
