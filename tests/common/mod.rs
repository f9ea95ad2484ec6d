#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use certpay_api::config::AppConfig;
use certpay_api::db;
use certpay_api::errors::ServiceError;
use certpay_api::gateway::{
    CancelReply, CancelRequestReply, CancelScope, PaymentGateway, PaymentRequest,
    PaymentRequestReply,
};
use certpay_api::handlers::AppServices;
use certpay_api::services::notifications::{NotificationSink, PaymentEvent};
use certpay_api::{app_router, AppState};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use url::form_urlencoded;

/// A call the mock gateway received, for assertions.
#[derive(Clone, Debug)]
pub enum GatewayCall {
    PayRequest {
        order_id: String,
        price: i64,
    },
    Cancel {
        mul_no: String,
        scope: CancelScope,
    },
    CancelRequest {
        mul_no: String,
        scope: CancelScope,
    },
}

/// In-process stand-in for PayApp. Records every call; cancel behavior can be
/// flipped to failure per test.
pub struct MockGateway {
    pub calls: Mutex<Vec<GatewayCall>>,
    pub fail_cancels: AtomicBool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_cancels: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn cancel_call_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, GatewayCall::Cancel { .. } | GatewayCall::CancelRequest { .. }))
            .count()
    }

    pub fn set_fail_cancels(&self, fail: bool) {
        self.fail_cancels.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_payment_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentRequestReply, ServiceError> {
        self.calls.lock().unwrap().push(GatewayCall::PayRequest {
            order_id: request.order_id.clone(),
            price: request.price,
        });
        Ok(PaymentRequestReply {
            pay_url: format!("https://pay.example.test/{}", request.order_id),
            mul_no: "90001".to_string(),
        })
    }

    async fn cancel_payment(
        &self,
        mul_no: &str,
        scope: CancelScope,
        _memo: &str,
    ) -> Result<CancelReply, ServiceError> {
        self.calls.lock().unwrap().push(GatewayCall::Cancel {
            mul_no: mul_no.to_string(),
            scope,
        });
        if self.fail_cancels.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayError("취소 불가".into()));
        }
        Ok(CancelReply { message: None })
    }

    async fn request_cancellation(
        &self,
        mul_no: &str,
        scope: CancelScope,
        _memo: &str,
    ) -> Result<CancelRequestReply, ServiceError> {
        self.calls.lock().unwrap().push(GatewayCall::CancelRequest {
            mul_no: mul_no.to_string(),
            scope,
        });
        if self.fail_cancels.load(Ordering::SeqCst) {
            return Err(ServiceError::GatewayError("취소 요청 불가".into()));
        }
        Ok(CancelRequestReply::default())
    }
}

/// Captures notifications instead of delivering them.
pub struct RecordingNotifier {
    pub events: Mutex<Vec<PaymentEvent>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<PaymentEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, event: &PaymentEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Test harness backed by a file SQLite database in a temp directory.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<RecordingNotifier>,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let tmp = TempDir::new().expect("temp dir for test database");
        let db_path = tmp.path().join("certpay_test.db");

        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
            "http://localhost:18080".to_string(),
            "testmerchant".to_string(),
            "test-link-key".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let gateway = Arc::new(MockGateway::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let services = AppServices::new(db_arc.clone(), gateway.clone(), notifier.clone());
        let state = AppState {
            db: db_arc,
            config: cfg,
            services,
        };

        let router = app_router(state.clone());

        Self {
            router,
            state,
            gateway,
            notifier,
            _tmp: tmp,
        }
    }

    /// JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Form-urlencoded POST, the shape PayApp callbacks arrive in.
    pub async fn post_form(&self, uri: &str, pairs: &[(&str, &str)]) -> axum::response::Response {
        let mut body = form_urlencoded::Serializer::new(String::new());
        for (k, v) in pairs {
            body.append_pair(k, v);
        }

        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.finish()))
            .expect("failed to build form request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Submit a valid application through the API and return its order id.
    pub async fn submit_application(&self, certificates: &[&str]) -> String {
        let response = self
            .request(
                Method::POST,
                "/api/v1/applications",
                Some(serde_json::json!({
                    "name": "홍길동",
                    "contact": "01012345678",
                    "birth_prefix": "900101",
                    "address_main": "서울특별시 강남구 테헤란로 1",
                    "address_detail": "101동 202호",
                    "postal_code": "06233",
                    "certificates": certificates,
                })),
            )
            .await;

        assert_eq!(response.status(), axum::http::StatusCode::CREATED);
        let body = read_json(response).await;
        body["data"]["order_id"]
            .as_str()
            .expect("order_id in submission response")
            .to_string()
    }

    /// Current payment status for an order, via the API.
    pub async fn payment_status(&self, order_id: &str) -> String {
        let response = self
            .request(
                Method::GET,
                &format!("/api/v1/applications/{}", order_id),
                None,
            )
            .await;
        let body = read_json(response).await;
        body["data"]["payment_status"]
            .as_str()
            .expect("payment_status in response")
            .to_string()
    }

    /// Audit trail actions for an order, oldest first.
    pub async fn audit_actions(&self, order_id: &str) -> Vec<String> {
        let logs = self
            .state
            .services
            .audit
            .history(order_id)
            .await
            .expect("audit history");
        logs.into_iter().map(|log| log.action).collect()
    }
}

pub async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body should be JSON")
}

pub async fn read_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    String::from_utf8(bytes.to_vec()).expect("response body should be UTF-8")
}
