use crate::db::DbPool;
use crate::entities::payment_log;
use crate::errors::ServiceError;
use crate::gateway::SignalChannel;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::Value;
use std::sync::Arc;
use strum::Display;
use tracing::instrument;
use uuid::Uuid;

/// Outcome of handling one payment signal, as recorded in the audit trail.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PaymentAction {
    PaymentRequested,
    PaymentSuccess,
    PaymentFailed,
    PaymentCancelled,
    CancellationRequested,
    /// Gateway refused a pre-settlement full cancel; record unchanged.
    CancelFullFailed,
    /// Gateway refused a pre-settlement partial cancel; record unchanged.
    CancelPartialFailed,
    /// Gateway refused a post-settlement cancellation request.
    CancelRequestFailed,
    /// Repeat of an already-applied success signal; no state change.
    DuplicateIgnored,
    /// Signal that would move one terminal state to another; rejected.
    ConflictingSignal,
    /// Signal whose state field was missing or unrecognized; no state change.
    AmbiguousSignal,
}

/// Append-only writer for the payment audit trail.
///
/// Every handled signal gets exactly one row, including the ones that
/// deliberately change nothing. Rows are never updated or deleted.
#[derive(Clone)]
pub struct PaymentLogService {
    db: Arc<DbPool>,
}

impl PaymentLogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, detail), fields(order_id = %order_id, action = %action, channel = %channel.as_str()))]
    pub async fn record(
        &self,
        application_id: Uuid,
        order_id: &str,
        action: PaymentAction,
        channel: SignalChannel,
        trade_id: Option<&str>,
        detail: Option<Value>,
    ) -> Result<payment_log::Model, ServiceError> {
        let entry = payment_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            application_id: Set(application_id),
            order_id: Set(order_id.to_string()),
            action: Set(action.to_string()),
            channel: Set(channel.as_str().to_string()),
            trade_id: Set(trade_id.map(str::to_string)),
            detail: Set(detail),
            created_at: Set(Utc::now()),
        };

        let model = entry.insert(&*self.db).await?;
        Ok(model)
    }

    /// Full history for one order, oldest first.
    pub async fn history(&self, order_id: &str) -> Result<Vec<payment_log::Model>, ServiceError> {
        let logs = payment_log::Entity::find()
            .filter(payment_log::Column::OrderId.eq(order_id))
            .order_by_asc(payment_log::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(logs)
    }
}
