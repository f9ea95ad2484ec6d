//! PayApp REST client.
//!
//! PayApp's API is a single form-urlencoded endpoint multiplexed on a `cmd`
//! parameter. Responses are also form-urlencoded; `state=1` means the call
//! was accepted.

pub mod signal;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use url::form_urlencoded;

pub use signal::{GatewaySignalState, PaymentSignal, SignalChannel};

/// Outbound request to open a payment window.
#[derive(Clone, Debug)]
pub struct PaymentRequest {
    /// Merchant order id, passed through PayApp as `var1` and echoed back in
    /// every callback.
    pub order_id: String,
    pub goods_name: String,
    /// Whole KRW.
    pub price: i64,
    pub recv_phone: String,
    pub recv_name: String,
}

/// Successful `payrequest` reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentRequestReply {
    /// URL the customer is sent to for payment.
    pub pay_url: String,
    /// PayApp payment request number, required later for cancellation.
    pub mul_no: String,
}

/// Whether a cancellation covers the whole payment or a part of it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CancelScope {
    Full,
    /// Partial refund amount in whole KRW.
    Partial(i64),
}

impl CancelScope {
    pub fn amount(&self) -> Option<i64> {
        match self {
            CancelScope::Full => None,
            CancelScope::Partial(amount) => Some(*amount),
        }
    }
}

/// Synchronous `paycancel` reply (pre-settlement refunds).
#[derive(Clone, Debug)]
pub struct CancelReply {
    pub message: Option<String>,
}

/// Asynchronous `paycancelreq` reply (post-settlement cancellation requests).
/// The refund itself is settled later by PayApp; these fields describe the
/// payback arrangement when PayApp includes one.
#[derive(Clone, Debug, Default)]
pub struct CancelRequestReply {
    pub message: Option<String>,
    pub payback_bank: Option<String>,
    pub payback_price: Option<i64>,
    pub depositor_name: Option<String>,
}

/// Abstraction over the payment gateway so services and tests never talk to
/// PayApp directly.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentRequestReply, ServiceError>;

    /// Pre-settlement cancel (D+5). Synchronous; the refund is effective when
    /// this returns Ok.
    async fn cancel_payment(
        &self,
        mul_no: &str,
        scope: CancelScope,
        memo: &str,
    ) -> Result<CancelReply, ServiceError>;

    /// Post-settlement cancellation request. Acceptance here does NOT mean
    /// the refund happened; PayApp processes it out of band.
    async fn request_cancellation(
        &self,
        mul_no: &str,
        scope: CancelScope,
        memo: &str,
    ) -> Result<CancelRequestReply, ServiceError>;
}

/// Reqwest-backed PayApp client.
#[derive(Clone)]
pub struct PayAppClient {
    http: reqwest::Client,
    api_url: String,
    user_id: String,
    link_key: String,
    shop_name: String,
    base_url: String,
}

impl PayAppClient {
    pub fn from_config(cfg: &AppConfig) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.gateway_timeout_secs))
            .build()
            .map_err(|e| {
                ServiceError::InternalError(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            api_url: cfg.payapp_api_url.clone(),
            user_id: cfg.payapp_user_id.clone(),
            link_key: cfg.payapp_link_key.clone(),
            shop_name: cfg.payapp_shop_name.clone(),
            base_url: cfg.base_url.clone(),
        })
    }

    async fn call(&self, body: String) -> Result<Vec<(String, String)>, ServiceError> {
        let response = self
            .http
            .post(&self.api_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                error!("PayApp request failed: {}", e);
                ServiceError::GatewayError(format!("payment gateway unreachable: {}", e))
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!("PayApp response body unreadable: {}", e);
            ServiceError::GatewayError(format!("payment gateway response unreadable: {}", e))
        })?;

        if !status.is_success() {
            warn!(status = %status, "PayApp returned non-success HTTP status");
            return Err(ServiceError::GatewayError(format!(
                "payment gateway returned HTTP {}",
                status
            )));
        }

        Ok(form_urlencoded::parse(text.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect())
    }

    fn reply_field<'a>(fields: &'a [(String, String)], key: &str) -> Option<&'a str> {
        fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .filter(|v| !v.is_empty())
    }

    fn reply_state(fields: &[(String, String)]) -> GatewaySignalState {
        GatewaySignalState::from_field(Self::reply_field(fields, "state"))
    }

    fn cancel_body(&self, cmd: &str, mul_no: &str, scope: CancelScope, memo: &str) -> String {
        let mut body = form_urlencoded::Serializer::new(String::new());
        body.append_pair("cmd", cmd)
            .append_pair("userid", &self.user_id)
            .append_pair("linkkey", &self.link_key)
            .append_pair("mul_no", mul_no)
            .append_pair("cancelmemo", memo);

        if let CancelScope::Partial(amount) = scope {
            body.append_pair("partcancel", "1")
                .append_pair("cancelprice", &amount.to_string());
        }

        body.finish()
    }
}

#[async_trait]
impl PaymentGateway for PayAppClient {
    #[instrument(skip(self, request), fields(order_id = %request.order_id, price = request.price))]
    async fn create_payment_request(
        &self,
        request: &PaymentRequest,
    ) -> Result<PaymentRequestReply, ServiceError> {
        // PayApp rejects these with an opaque error; check before the call.
        if request.goods_name.is_empty() || request.recv_phone.is_empty() || request.price <= 0 {
            return Err(ServiceError::ValidationError(
                "payment request requires goods name, phone number and a positive price".into(),
            ));
        }

        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("cmd", "payrequest")
            .append_pair("userid", &self.user_id)
            .append_pair("shopname", &self.shop_name)
            .append_pair("goodname", &request.goods_name)
            .append_pair("price", &request.price.to_string())
            .append_pair("recvphone", &request.recv_phone)
            .append_pair("memo", &request.recv_name)
            .append_pair("feedbackurl", &format!("{}/api/v1/payments/webhook", self.base_url))
            .append_pair("returnurl", &format!("{}/api/v1/payments/result", self.base_url))
            .append_pair("var1", &request.order_id)
            .append_pair("skip_cstpage", "y")
            .append_pair("smsuse", "n")
            .finish();

        let fields = self.call(body).await?;

        match Self::reply_state(&fields) {
            GatewaySignalState::Success => {
                let pay_url = Self::reply_field(&fields, "payurl").ok_or_else(|| {
                    ServiceError::GatewayError("payment gateway accepted but sent no payurl".into())
                })?;
                let mul_no = Self::reply_field(&fields, "mul_no").ok_or_else(|| {
                    ServiceError::GatewayError("payment gateway accepted but sent no mul_no".into())
                })?;

                info!(mul_no = %mul_no, "payment request created");
                Ok(PaymentRequestReply {
                    pay_url: pay_url.to_string(),
                    mul_no: mul_no.to_string(),
                })
            }
            _ => {
                let message = Self::reply_field(&fields, "errorMessage")
                    .unwrap_or("payment request rejected");
                warn!(message = %message, "payment request rejected by gateway");
                Err(ServiceError::GatewayError(message.to_string()))
            }
        }
    }

    #[instrument(skip(self, memo), fields(mul_no = %mul_no))]
    async fn cancel_payment(
        &self,
        mul_no: &str,
        scope: CancelScope,
        memo: &str,
    ) -> Result<CancelReply, ServiceError> {
        if mul_no.is_empty() {
            return Err(ServiceError::ValidationError(
                "cancellation requires the gateway payment number".into(),
            ));
        }

        let body = self.cancel_body("paycancel", mul_no, scope, memo);
        let fields = self.call(body).await?;

        match Self::reply_state(&fields) {
            GatewaySignalState::Success => {
                info!("payment cancelled at gateway");
                Ok(CancelReply {
                    message: Self::reply_field(&fields, "errorMessage").map(str::to_string),
                })
            }
            _ => {
                let message =
                    Self::reply_field(&fields, "errorMessage").unwrap_or("cancellation rejected");
                warn!(message = %message, "cancellation rejected by gateway");
                Err(ServiceError::GatewayError(message.to_string()))
            }
        }
    }

    #[instrument(skip(self, memo), fields(mul_no = %mul_no))]
    async fn request_cancellation(
        &self,
        mul_no: &str,
        scope: CancelScope,
        memo: &str,
    ) -> Result<CancelRequestReply, ServiceError> {
        if mul_no.is_empty() {
            return Err(ServiceError::ValidationError(
                "cancellation requires the gateway payment number".into(),
            ));
        }

        let body = self.cancel_body("paycancelreq", mul_no, scope, memo);
        let fields = self.call(body).await?;

        match Self::reply_state(&fields) {
            GatewaySignalState::Success => {
                info!("cancellation request accepted by gateway");
                Ok(CancelRequestReply {
                    message: Self::reply_field(&fields, "errorMessage").map(str::to_string),
                    payback_bank: Self::reply_field(&fields, "paybackbank").map(str::to_string),
                    payback_price: Self::reply_field(&fields, "paybackprice")
                        .and_then(|v| v.parse().ok()),
                    depositor_name: Self::reply_field(&fields, "cr_dpname").map(str::to_string),
                })
            }
            _ => {
                let message = Self::reply_field(&fields, "errorMessage")
                    .unwrap_or("cancellation request rejected");
                warn!(message = %message, "cancellation request rejected by gateway");
                Err(ServiceError::GatewayError(message.to_string()))
            }
        }
    }
}
