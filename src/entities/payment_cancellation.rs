use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// How a cancellation was executed against the gateway.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CancelType {
    /// Synchronous full refund before settlement.
    Full,
    /// Synchronous partial refund before settlement.
    Partial,
    /// Asynchronous cancellation request after settlement.
    Request,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CancellationStatus {
    Approved,
    Pending,
    Rejected,
}

impl CancelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancelType::Full => "full",
            CancelType::Partial => "partial",
            CancelType::Request => "request",
        }
    }
}

impl CancellationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CancellationStatus::Approved => "approved",
            CancellationStatus::Pending => "pending",
            CancellationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_cancellations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub application_id: Uuid,
    pub order_id: String,
    pub mul_no: Option<String>,

    pub cancel_type: String,

    /// Refunded amount in whole KRW; None for a full cancel.
    pub amount: Option<i64>,
    pub reason: Option<String>,

    pub status: String,
    pub gateway_message: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}
