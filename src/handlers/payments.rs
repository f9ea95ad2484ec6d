use crate::entities::application::PaymentStatus;
use crate::gateway::{PaymentSignal, SignalChannel};
use crate::handlers::AppState;
use crate::services::ReconcileOutcome;
use axum::{
    extract::{RawForm, RawQuery, State},
    response::Redirect,
    routing::get,
    Router,
};
use tracing::{error, instrument};
use url::form_urlencoded;

/// Where the customer's browser lands after the payment attempt.
///
/// PayApp calls the return URL with the result in the query string (GET) or a
/// form body (POST). Either way the browser is waiting for a redirect back to
/// the application form, so every path out of here is a redirect; errors
/// surface as `payment=error` rather than an HTTP error page.
#[utoipa::path(
    get,
    path = "/api/v1/payments/result",
    responses(
        (status = 303, description = "Redirect back to the application frontend")
    ),
    tag = "Payments"
)]
#[instrument(skip_all)]
pub async fn payment_result_get(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Redirect {
    let pairs: Vec<(String, String)> =
        form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
    handle_result(state, pairs).await
}

#[utoipa::path(
    post,
    path = "/api/v1/payments/result",
    responses(
        (status = 303, description = "Redirect back to the application frontend")
    ),
    tag = "Payments"
)]
#[instrument(skip_all)]
pub async fn payment_result_post(State(state): State<AppState>, RawForm(body): RawForm) -> Redirect {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(&body)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    handle_result(state, pairs).await
}

async fn handle_result(state: AppState, pairs: Vec<(String, String)>) -> Redirect {
    let signal = PaymentSignal::from_form_pairs(pairs.iter().map(|(k, v)| (k, v)));
    let base = state.config.base_url.clone();
    let order_id = signal.order_id.clone().unwrap_or_default();

    let outcome = match state
        .services
        .reconciliation
        .reconcile(&signal, SignalChannel::BrowserRedirect)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(error = %e, "failed to reconcile browser redirect");
            return Redirect::to(&format!("{}/?payment=error", base));
        }
    };

    match outcome {
        ReconcileOutcome::Applied {
            status: PaymentStatus::Paid,
            ..
        } => Redirect::to(&format!("{}/?payment=success&step=3", base)),
        ReconcileOutcome::Applied { application, .. } => {
            let message = application.failed_message.unwrap_or_default();
            Redirect::to(&format!(
                "{}/?payment=failed&orderId={}&message={}",
                base,
                order_id,
                urlencode(&message)
            ))
        }
        ReconcileOutcome::DuplicateIgnored { application } => {
            // The webhook usually wins the race; show the settled state.
            match application.payment_status() {
                PaymentStatus::Paid => {
                    Redirect::to(&format!("{}/?payment=success&step=3", base))
                }
                _ => {
                    let message = application.failed_message.unwrap_or_default();
                    Redirect::to(&format!(
                        "{}/?payment=failed&orderId={}&message={}",
                        base,
                        order_id,
                        urlencode(&message)
                    ))
                }
            }
        }
        ReconcileOutcome::Ambiguous => Redirect::to(&format!(
            "{}/?payment=pending&orderId={}",
            base, order_id
        )),
        ReconcileOutcome::Conflict { .. } | ReconcileOutcome::UnknownOrder => {
            Redirect::to(&format!("{}/?payment=error", base))
        }
    }
}

fn urlencode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

pub fn payment_routes() -> Router<AppState> {
    Router::new().route("/result", get(payment_result_get).post(payment_result_post))
}
