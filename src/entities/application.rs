use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Payment lifecycle of a certificate application.
///
/// Stored as a plain string column. Transitions are enforced in the
/// reconciliation service, never at the storage layer.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states never transition to another terminal state through
    /// gateway signals. Cancellation of a paid record goes through the
    /// operator cancel path instead.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "certificate_applications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Merchant-side order identifier, e.g. "CERT-20250301120000-A1B2C3".
    /// Unique; this is the key every payment signal is matched on.
    pub order_id: String,

    pub name: String,
    pub contact: String,
    pub birth_prefix: Option<String>,
    pub address_main: String,
    pub address_detail: Option<String>,
    pub postal_code: Option<String>,

    /// Selected certificate names, stored as a JSON array of strings.
    pub certificates: Json,

    pub cash_receipt: Option<String>,
    pub photo_url: Option<String>,

    pub payment_status: String,

    /// Total in whole KRW.
    pub amount: i64,

    /// Gateway transaction id, recorded on the first accepted success signal.
    pub trade_id: Option<String>,
    /// Gateway payment request number, needed later for cancellation.
    pub mul_no: Option<String>,
    pub pay_method: Option<String>,

    pub paid_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failed_message: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
            .parse()
            .unwrap_or(PaymentStatus::Pending)
    }

    pub fn certificate_names(&self) -> Vec<String> {
        serde_json::from_value(self.certificates.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Paid,
            PaymentStatus::Failed,
            PaymentStatus::Cancelled,
        ] {
            let parsed: PaymentStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Paid.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Cancelled.is_terminal());
    }
}
