use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// What happened to a payment, for operator notification.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PaymentEventKind {
    Confirmed,
    Failed,
    Cancelled,
    CancellationRequested,
}

impl PaymentEventKind {
    fn headline(&self) -> &'static str {
        match self {
            PaymentEventKind::Confirmed => "💳 결제 완료",
            PaymentEventKind::Failed => "❌ 결제 실패",
            PaymentEventKind::Cancelled => "↩️ 결제 취소",
            PaymentEventKind::CancellationRequested => "⏳ 취소 요청 접수",
        }
    }

    fn color(&self) -> &'static str {
        match self {
            PaymentEventKind::Confirmed => "#28A745",
            PaymentEventKind::Failed => "#DC3545",
            PaymentEventKind::Cancelled | PaymentEventKind::CancellationRequested => "#FFC107",
        }
    }
}

/// Notification payload. Built from the committed record, never from the raw
/// gateway signal.
#[derive(Clone, Debug)]
pub struct PaymentEvent {
    pub kind: PaymentEventKind,
    pub order_id: String,
    pub applicant_name: String,
    pub contact: String,
    pub amount: i64,
    pub certificates: Vec<String>,
    pub message: Option<String>,
}

/// Best-effort notification sink. Delivery failures are logged and swallowed;
/// a down Slack must never fail a payment.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, event: &PaymentEvent);
}

/// Posts payment events to a Slack incoming webhook.
pub struct SlackNotifier {
    http: reqwest::Client,
    webhook_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: String, timeout_secs: u64) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http, webhook_url })
    }

    fn build_message(event: &PaymentEvent) -> serde_json::Value {
        let mut fields = vec![
            json!({ "title": "신청자", "value": event.applicant_name, "short": true }),
            json!({ "title": "연락처", "value": event.contact, "short": true }),
            json!({ "title": "주문번호", "value": event.order_id, "short": false }),
            json!({
                "title": "금액",
                "value": format!("{}원", event.amount),
                "short": true
            }),
        ];

        if !event.certificates.is_empty() {
            fields.push(json!({
                "title": "신청 자격증",
                "value": event.certificates.join(", "),
                "short": false
            }));
        }

        if let Some(message) = &event.message {
            fields.push(json!({ "title": "비고", "value": message, "short": false }));
        }

        json!({
            "text": event.kind.headline(),
            "attachments": [{
                "color": event.kind.color(),
                "fields": fields,
            }]
        })
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    async fn notify(&self, event: &PaymentEvent) {
        let message = Self::build_message(event);

        match self
            .http
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!(order_id = %event.order_id, "Slack notification delivered");
            }
            Ok(response) => {
                debug!(
                    order_id = %event.order_id,
                    status = %response.status(),
                    "Slack rejected notification"
                );
            }
            Err(e) => {
                debug!(order_id = %event.order_id, error = %e, "Slack notification failed");
            }
        }
    }
}

/// Sink used when no webhook is configured.
pub struct NoopNotifier;

#[async_trait]
impl NotificationSink for NoopNotifier {
    async fn notify(&self, event: &PaymentEvent) {
        debug!(order_id = %event.order_id, "notification suppressed (no sink configured)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> PaymentEvent {
        PaymentEvent {
            kind: PaymentEventKind::Confirmed,
            order_id: "CERT-20250301120000-A1B2C3".into(),
            applicant_name: "홍길동".into(),
            contact: "01012345678".into(),
            amount: 200_000,
            certificates: vec!["심리상담사1급".into(), "독서지도사1급".into()],
            message: None,
        }
    }

    #[test]
    fn message_carries_applicant_and_amount() {
        let message = SlackNotifier::build_message(&event());
        let rendered = message.to_string();
        assert!(rendered.contains("홍길동"));
        assert!(rendered.contains("200000원"));
        assert!(rendered.contains("심리상담사1급, 독서지도사1급"));
    }

    #[test]
    fn failure_message_includes_reason() {
        let mut e = event();
        e.kind = PaymentEventKind::Failed;
        e.message = Some("한도초과".into());
        let rendered = SlackNotifier::build_message(&e).to_string();
        assert!(rendered.contains("한도초과"));
        assert!(rendered.contains("결제 실패"));
    }
}
