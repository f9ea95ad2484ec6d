use crate::entities::payment_cancellation::{self, CancelType};
use crate::errors::ServiceError;
use crate::handlers::AppState;
use crate::services::cancellations::CancelPaymentInput;
use crate::ApiResponse;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Deserialize, ToSchema)]
#[schema(example = json!({
    "order_id": "CERT-20250301120000-A1B2C3",
    "cancel_type": "full",
    "reason": "고객 요청"
}))]
pub struct CancelPaymentRequest {
    /// Merchant order id of the paid application
    pub order_id: String,
    /// "full" or "partial" before settlement, "request" after
    pub cancel_type: CancelType,
    /// Whole KRW; required when cancel_type is "partial"
    pub amount: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CancellationResponse {
    pub order_id: String,
    pub cancel_type: String,
    pub amount: Option<i64>,
    pub status: String,
    pub gateway_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<payment_cancellation::Model> for CancellationResponse {
    fn from(model: payment_cancellation::Model) -> Self {
        Self {
            order_id: model.order_id,
            cancel_type: model.cancel_type,
            amount: model.amount,
            status: model.status,
            gateway_message: model.gateway_message,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CancellationListQuery {
    /// Merchant order id
    pub order_id: String,
}

/// Cancel a paid application, or queue a post-settlement cancellation request
#[utoipa::path(
    post,
    path = "/api/v1/payments/cancel",
    request_body = CancelPaymentRequest,
    responses(
        (status = 200, description = "Cancellation executed or queued", body = crate::ApiResponse<CancellationResponse>),
        (status = 400, description = "Not cancellable in its current state", body = crate::errors::ErrorResponse),
        (status = 404, description = "No such application", body = crate::errors::ErrorResponse),
        (status = 502, description = "Gateway refused the cancellation", body = crate::errors::ErrorResponse)
    ),
    tag = "Cancellations"
)]
pub async fn cancel_payment(
    State(state): State<AppState>,
    Json(request): Json<CancelPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CancellationResponse>>), ServiceError> {
    let input = CancelPaymentInput {
        cancel_type: request.cancel_type,
        amount: request.amount,
        reason: request.reason,
    };

    let record = state
        .services
        .cancellations
        .initiate(&request.order_id, input)
        .await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(record.into()))))
}

/// Cancellation history for an order
#[utoipa::path(
    get,
    path = "/api/v1/payments/cancel",
    params(CancellationListQuery),
    responses(
        (status = 200, description = "Cancellations, newest first", body = crate::ApiResponse<Vec<CancellationResponse>>)
    ),
    tag = "Cancellations"
)]
pub async fn list_cancellations(
    State(state): State<AppState>,
    Query(query): Query<CancellationListQuery>,
) -> Result<Json<ApiResponse<Vec<CancellationResponse>>>, ServiceError> {
    let rows = state.services.cancellations.list(&query.order_id).await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(Into::into).collect(),
    )))
}

pub fn cancellation_routes() -> Router<AppState> {
    Router::new().route("/cancel", post(cancel_payment).get(list_cancellations))
}
