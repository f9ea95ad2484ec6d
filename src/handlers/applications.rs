use crate::entities::{application, payment_log};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::applications::CreateApplicationInput;
use crate::ApiResponse;
use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

/// Application view returned to clients.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApplicationResponse {
    pub order_id: String,
    pub name: String,
    pub contact: String,
    pub certificates: Vec<String>,
    pub amount: i64,
    pub payment_status: String,
    pub pay_method: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub failed_message: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<application::Model> for ApplicationResponse {
    fn from(model: application::Model) -> Self {
        let certificates = model.certificate_names();
        Self {
            order_id: model.order_id,
            name: model.name,
            contact: model.contact,
            certificates,
            amount: model.amount,
            payment_status: model.payment_status,
            pay_method: model.pay_method,
            paid_at: model.paid_at,
            failed_message: model.failed_message,
            cancelled_at: model.cancelled_at,
            created_at: model.created_at,
        }
    }
}

/// Reply to a successful submission: where to send the customer to pay.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmissionResponse {
    pub order_id: String,
    pub pay_url: String,
    pub amount: i64,
    pub payment_status: String,
}

/// One audit trail entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentLogResponse {
    pub action: String,
    pub channel: String,
    pub trade_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<payment_log::Model> for PaymentLogResponse {
    fn from(model: payment_log::Model) -> Self {
        Self {
            action: model.action,
            channel: model.channel,
            trade_id: model.trade_id,
            created_at: model.created_at,
        }
    }
}

/// Submit a certificate application and open a payment request
#[utoipa::path(
    post,
    path = "/api/v1/applications",
    request_body = CreateApplicationInput,
    responses(
        (status = 201, description = "Application created, payment window ready", body = crate::ApiResponse<SubmissionResponse>),
        (status = 400, description = "Invalid input", body = crate::errors::ErrorResponse),
        (status = 502, description = "Payment gateway rejected the request", body = crate::errors::ErrorResponse)
    ),
    tag = "Applications"
)]
pub async fn submit_application(
    State(state): State<AppState>,
    Json(input): Json<CreateApplicationInput>,
) -> Result<(StatusCode, Json<ApiResponse<SubmissionResponse>>), ServiceError> {
    let submitted = state.services.applications.submit(input).await?;

    let response = SubmissionResponse {
        order_id: submitted.application.order_id.clone(),
        pay_url: submitted.pay_url,
        amount: submitted.application.amount,
        payment_status: submitted.application.payment_status.clone(),
    };

    Ok((StatusCode::CREATED, Json(ApiResponse::success(response))))
}

/// Look up an application by order id
#[utoipa::path(
    get,
    path = "/api/v1/applications/{order_id}",
    params(
        ("order_id" = String, Path, description = "Merchant order id")
    ),
    responses(
        (status = 200, description = "Application found", body = crate::ApiResponse<ApplicationResponse>),
        (status = 404, description = "No such application", body = crate::errors::ErrorResponse)
    ),
    tag = "Applications"
)]
pub async fn get_application(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<ApplicationResponse>>, ServiceError> {
    let app = state.services.applications.get_by_order_id(&order_id).await?;
    Ok(Json(ApiResponse::success(app.into())))
}

/// Payment audit trail for an order
#[utoipa::path(
    get,
    path = "/api/v1/applications/{order_id}/logs",
    params(
        ("order_id" = String, Path, description = "Merchant order id")
    ),
    responses(
        (status = 200, description = "Audit trail, oldest first", body = crate::ApiResponse<Vec<PaymentLogResponse>>),
        (status = 404, description = "No such application", body = crate::errors::ErrorResponse)
    ),
    tag = "Applications"
)]
pub async fn get_application_logs(
    State(state): State<AppState>,
    Path(order_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<PaymentLogResponse>>>, ServiceError> {
    // 404 for unknown orders rather than an empty list
    state.services.applications.get_by_order_id(&order_id).await?;

    let logs = state.services.audit.history(&order_id).await?;
    Ok(Json(ApiResponse::success(
        logs.into_iter().map(Into::into).collect(),
    )))
}

pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_application))
        .route("/:order_id", get(get_application))
        .route("/:order_id/logs", get(get_application_logs))
}
