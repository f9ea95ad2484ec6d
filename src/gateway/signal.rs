use serde_json::{Map, Value};
use std::collections::HashMap;
use strum::Display;

/// Three-valued result state carried by gateway callbacks.
///
/// PayApp sends `state=1` for success and `state=0` for failure. A payload
/// with no `state` field proves nothing either way and must never be treated
/// as success.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GatewaySignalState {
    Success,
    Failure,
    Unknown,
}

impl GatewaySignalState {
    pub fn from_field(state: Option<&str>) -> Self {
        match state {
            Some("1") => GatewaySignalState::Success,
            Some("0") => GatewaySignalState::Failure,
            _ => GatewaySignalState::Unknown,
        }
    }
}

/// Where a payment signal arrived from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum SignalChannel {
    /// The customer's browser returning from the payment page.
    BrowserRedirect,
    /// PayApp's server-to-server feedback call.
    ServerWebhook,
    /// Synchronous confirmation of an operator-initiated cancel.
    CancelConfirmation,
    /// Action taken by this service itself, e.g. opening a payment request.
    Operator,
}

impl SignalChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalChannel::BrowserRedirect => "browser_redirect",
            SignalChannel::ServerWebhook => "server_webhook",
            SignalChannel::CancelConfirmation => "cancel_confirmation",
            SignalChannel::Operator => "operator",
        }
    }
}

/// A parsed payment signal, decoupled from its transport.
///
/// `order_id` comes from PayApp's `var1` pass-through field; the rest map
/// directly to callback parameters.
#[derive(Clone, Debug)]
pub struct PaymentSignal {
    pub state: GatewaySignalState,
    pub order_id: Option<String>,
    pub trade_id: Option<String>,
    pub mul_no: Option<String>,
    pub price: Option<i64>,
    pub pay_method: Option<String>,
    pub message: Option<String>,
    /// Full payload preserved for the audit trail.
    pub raw: Value,
}

impl PaymentSignal {
    /// Builds a signal from decoded form pairs (both webhook bodies and
    /// redirect query strings use the same field names).
    pub fn from_form_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let fields: HashMap<String, String> = pairs
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_string(), v.as_ref().to_string()))
            .collect();

        let raw = Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect::<Map<_, _>>(),
        );

        let non_empty = |key: &str| fields.get(key).filter(|v| !v.is_empty()).cloned();

        Self {
            state: GatewaySignalState::from_field(fields.get("state").map(String::as_str)),
            order_id: non_empty("var1"),
            trade_id: non_empty("tradeid"),
            mul_no: non_empty("mul_no"),
            price: non_empty("price").and_then(|p| p.parse().ok()),
            pay_method: non_empty("pay_type").or_else(|| non_empty("paymethod")),
            message: non_empty("message").or_else(|| non_empty("errorMessage")),
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_signal_parses_all_fields() {
        let signal = PaymentSignal::from_form_pairs([
            ("state", "1"),
            ("tradeid", "T123456"),
            ("mul_no", "98765"),
            ("var1", "CERT-20250301120000-A1B2C3"),
            ("price", "200000"),
            ("pay_type", "card"),
        ]);

        assert_eq!(signal.state, GatewaySignalState::Success);
        assert_eq!(signal.trade_id.as_deref(), Some("T123456"));
        assert_eq!(signal.mul_no.as_deref(), Some("98765"));
        assert_eq!(
            signal.order_id.as_deref(),
            Some("CERT-20250301120000-A1B2C3")
        );
        assert_eq!(signal.price, Some(200_000));
        assert_eq!(signal.pay_method.as_deref(), Some("card"));
    }

    #[test]
    fn state_zero_is_failure() {
        let signal = PaymentSignal::from_form_pairs([
            ("state", "0"),
            ("var1", "CERT-1"),
            ("errorMessage", "한도초과"),
        ]);
        assert_eq!(signal.state, GatewaySignalState::Failure);
        assert_eq!(signal.message.as_deref(), Some("한도초과"));
    }

    #[test]
    fn absent_state_is_unknown_not_success() {
        let signal =
            PaymentSignal::from_form_pairs([("tradeid", "T123456"), ("var1", "CERT-1")]);
        assert_eq!(signal.state, GatewaySignalState::Unknown);
    }

    #[test]
    fn unexpected_state_value_is_unknown() {
        let signal = PaymentSignal::from_form_pairs([("state", "2"), ("var1", "CERT-1")]);
        assert_eq!(signal.state, GatewaySignalState::Unknown);
    }

    #[test]
    fn empty_fields_are_treated_as_absent() {
        let signal = PaymentSignal::from_form_pairs([("state", "1"), ("tradeid", "")]);
        assert_eq!(signal.trade_id, None);
    }

    #[test]
    fn raw_payload_is_preserved() {
        let signal = PaymentSignal::from_form_pairs([("state", "1"), ("custom", "x")]);
        assert_eq!(signal.raw["custom"], "x");
    }
}
