pub mod catalog;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Versioned API surface.
pub fn api_v1_routes() -> Router<AppState> {
    let payment_routes = handlers::payments::payment_routes()
        .merge(handlers::payment_webhooks::webhook_routes())
        .merge(handlers::cancellations::cancellation_routes());

    Router::new()
        .nest("/applications", handlers::applications::application_routes())
        .nest("/payments", payment_routes)
}

/// Full application router: versioned API, health endpoints and Swagger UI.
pub fn app_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", api_v1_routes())
        .route("/health", get(health_check))
        .route("/status", get(api_status))
        .merge(openapi::swagger_ui())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> ApiResult<Value> {
    db::check_connection(&state.db).await?;
    Ok(Json(ApiResponse::success(json!({ "status": "healthy" }))))
}

async fn api_status(State(state): State<AppState>) -> ApiResult<Value> {
    let status_data = json!({
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });
    Ok(Json(ApiResponse::success(status_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn success_response_includes_timestamp() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        let meta = response.meta.expect("metadata expected");
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[test]
    fn error_response_carries_message() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("oops"));
    }
}
