use crate::gateway::{PaymentSignal, SignalChannel};
use crate::handlers::AppState;
use crate::services::ReconcileOutcome;
use axum::{
    extract::{RawForm, State},
    http::StatusCode,
    routing::post,
    Router,
};
use tracing::{error, info, instrument, warn};
use url::form_urlencoded;

/// PayApp's server-to-server feedback endpoint.
///
/// PayApp retries until it receives the literal body "SUCCESS". Every signal
/// this service was able to handle must therefore be acknowledged, including
/// duplicates, conflicts and signals for unknown orders; acknowledging those
/// does not change any record, it only stops pointless retries. Only storage
/// failures return an error status, so PayApp retries and the signal gets
/// another chance once the database is back.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    responses(
        (status = 200, description = "Signal handled; body is the literal SUCCESS ack"),
        (status = 500, description = "Storage failure; gateway should retry")
    ),
    tag = "Payments"
)]
#[instrument(skip_all)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    RawForm(body): RawForm,
) -> (StatusCode, &'static str) {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(&body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let signal = PaymentSignal::from_form_pairs(pairs.iter().map(|(k, v)| (k, v)));

    match state
        .services
        .reconciliation
        .reconcile(&signal, SignalChannel::ServerWebhook)
        .await
    {
        Ok(ReconcileOutcome::Applied { status, .. }) => {
            info!(status = status.as_str(), "webhook applied");
            (StatusCode::OK, "SUCCESS")
        }
        Ok(ReconcileOutcome::DuplicateIgnored { .. }) => {
            info!("webhook duplicate acknowledged");
            (StatusCode::OK, "SUCCESS")
        }
        Ok(ReconcileOutcome::Conflict { current }) => {
            warn!(current = current.as_str(), "webhook conflict acknowledged without mutation");
            (StatusCode::OK, "SUCCESS")
        }
        Ok(ReconcileOutcome::Ambiguous) => {
            warn!("ambiguous webhook acknowledged without mutation");
            (StatusCode::OK, "SUCCESS")
        }
        Ok(ReconcileOutcome::UnknownOrder) => {
            warn!("webhook for unknown order acknowledged");
            (StatusCode::OK, "SUCCESS")
        }
        // A signal with no order id can never be matched; retrying it would
        // change nothing, so stop the retries.
        Err(crate::errors::ServiceError::BadRequest(reason)) => {
            warn!(reason = %reason, "unmatchable webhook acknowledged");
            (StatusCode::OK, "SUCCESS")
        }
        Err(e) => {
            error!(error = %e, "webhook processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "ERROR")
        }
    }
}

pub fn webhook_routes() -> Router<AppState> {
    Router::new().route("/webhook", post(payment_webhook))
}
