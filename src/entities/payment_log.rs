use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Append-only audit record. One row per payment signal outcome, whether or
/// not the signal mutated the application.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub application_id: Uuid,
    pub order_id: String,

    /// Outcome tag, e.g. "payment_success", "duplicate_ignored".
    pub action: String,
    /// Signal origin, e.g. "server_webhook".
    pub channel: String,

    pub trade_id: Option<String>,

    /// Raw signal payload captured for later dispute resolution.
    pub detail: Option<Json>,

    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {}
