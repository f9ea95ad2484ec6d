use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CertPay API",
        version = "0.3.0",
        description = r#"
# Certificate Application & Payment API

Backend for certificate-course applications paid through PayApp.

## Flow

1. `POST /api/v1/applications` stores the application and opens a PayApp
   payment request; the response carries the `payurl` the customer is sent to.
2. PayApp reports the result twice: the customer's browser returns through
   `/api/v1/payments/result` and PayApp's server calls
   `/api/v1/payments/webhook`. Both feed the same reconciliation engine, so
   the order of arrival does not matter and repeats are absorbed.
3. Operators cancel paid orders through `/api/v1/payments/cancel`.

## Error Handling

Errors use a consistent format:

```json
{
  "error": "Bad Request",
  "message": "partial cancel requires an amount",
  "timestamp": "2025-03-01T00:00:00Z"
}
```
        "#,
        contact(
            name = "CertPay Support",
            email = "dev@korhrd.co.kr"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "https://cert.korhrd.co.kr", description = "Production server"),
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Applications", description = "Certificate application intake"),
        (name = "Payments", description = "PayApp callback endpoints"),
        (name = "Cancellations", description = "Operator cancellation endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Applications
        crate::handlers::applications::submit_application,
        crate::handlers::applications::get_application,
        crate::handlers::applications::get_application_logs,

        // Payment callbacks
        crate::handlers::payments::payment_result_get,
        crate::handlers::payments::payment_result_post,
        crate::handlers::payment_webhooks::payment_webhook,

        // Cancellations
        crate::handlers::cancellations::cancel_payment,
        crate::handlers::cancellations::list_cancellations,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,

            // Application types
            crate::handlers::applications::ApplicationResponse,
            crate::handlers::applications::SubmissionResponse,
            crate::handlers::applications::PaymentLogResponse,
            crate::services::applications::CreateApplicationInput,
            crate::entities::application::PaymentStatus,

            // Cancellation types
            crate::handlers::cancellations::CancelPaymentRequest,
            crate::handlers::cancellations::CancellationResponse,
            crate::entities::payment_cancellation::CancelType,
            crate::entities::payment_cancellation::CancellationStatus,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let doc = ApiDocV1::openapi();
        let json = serde_json::to_string(&doc).expect("document should serialize");
        assert!(json.contains("/api/v1/applications"));
        assert!(json.contains("/api/v1/payments/webhook"));
        assert!(json.contains("/api/v1/payments/cancel"));
    }
}
