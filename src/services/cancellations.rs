use crate::db::DbPool;
use crate::entities::application::{self, PaymentStatus};
use crate::entities::payment_cancellation::{self, CancelType, CancellationStatus};
use crate::errors::ServiceError;
use crate::gateway::{CancelScope, PaymentGateway, SignalChannel};
use crate::services::audit::{PaymentAction, PaymentLogService};
use crate::services::notifications::{NotificationSink, PaymentEvent, PaymentEventKind};
use crate::services::reconciliation::OrderLocks;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

const DEFAULT_CANCEL_MEMO: &str = "자격증 신청 취소";

/// Operator-initiated cancellation input.
#[derive(Clone, Debug)]
pub struct CancelPaymentInput {
    pub cancel_type: CancelType,
    /// Required for partial cancels; whole KRW.
    pub amount: Option<i64>,
    pub reason: Option<String>,
}

/// Executes operator cancellations against the gateway and the stored record.
///
/// Pre-settlement cancels (`Full`, `Partial`) are synchronous: when the
/// gateway accepts, the record moves to cancelled. Post-settlement requests
/// (`Request`) are asynchronous: the gateway queues the refund and the record
/// stays paid until PayApp confirms out of band.
#[derive(Clone)]
pub struct CancellationService {
    db: Arc<DbPool>,
    locks: Arc<OrderLocks>,
    audit: PaymentLogService,
    notifier: Arc<dyn NotificationSink>,
    gateway: Arc<dyn PaymentGateway>,
}

impl CancellationService {
    pub fn new(
        db: Arc<DbPool>,
        locks: Arc<OrderLocks>,
        audit: PaymentLogService,
        notifier: Arc<dyn NotificationSink>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            db,
            locks,
            audit,
            notifier,
            gateway,
        }
    }

    #[instrument(skip(self, input), fields(order_id = %order_id, cancel_type = %input.cancel_type))]
    pub async fn initiate(
        &self,
        order_id: &str,
        input: CancelPaymentInput,
    ) -> Result<payment_cancellation::Model, ServiceError> {
        let guard = self.locks.acquire(order_id).await;

        let app = application::Entity::find()
            .filter(application::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Application with order id {} not found", order_id))
            })?;

        let current = app.payment_status();
        if current != PaymentStatus::Paid {
            return Err(ServiceError::InvalidOperation(format!(
                "cannot cancel a payment in status '{}'",
                current.as_str()
            )));
        }

        let mul_no = app.mul_no.clone().ok_or_else(|| {
            ServiceError::InvalidOperation(
                "no gateway payment number recorded for this order".into(),
            )
        })?;

        // Validate the scope before touching the gateway.
        let scope = match input.cancel_type {
            CancelType::Partial => {
                let amount = input.amount.ok_or_else(|| {
                    ServiceError::ValidationError("partial cancel requires an amount".into())
                })?;
                if amount <= 0 || amount > app.amount {
                    return Err(ServiceError::ValidationError(format!(
                        "partial cancel amount must be between 1 and {}",
                        app.amount
                    )));
                }
                CancelScope::Partial(amount)
            }
            CancelType::Full | CancelType::Request => CancelScope::Full,
        };

        let memo = input.reason.clone().unwrap_or_else(|| DEFAULT_CANCEL_MEMO.to_string());

        let (status, gateway_message, event_kind) = match input.cancel_type {
            CancelType::Full | CancelType::Partial => {
                match self.gateway.cancel_payment(&mul_no, scope, &memo).await {
                    Ok(reply) => {
                        let now = Utc::now();
                        let mut active: application::ActiveModel = app.clone().into();
                        active.payment_status =
                            Set(PaymentStatus::Cancelled.as_str().to_string());
                        active.cancelled_at = Set(Some(now));
                        active.updated_at = Set(now);
                        active.update(&*self.db).await?;

                        self.audit
                            .record(
                                app.id,
                                order_id,
                                PaymentAction::PaymentCancelled,
                                SignalChannel::CancelConfirmation,
                                app.trade_id.as_deref(),
                                Some(json!({
                                    "cancel_type": input.cancel_type.as_str(),
                                    "amount": scope.amount(),
                                    "memo": memo,
                                })),
                            )
                            .await?;

                        info!("payment cancelled");
                        (
                            CancellationStatus::Approved,
                            reply.message,
                            Some(PaymentEventKind::Cancelled),
                        )
                    }
                    Err(e) => {
                        warn!(error = %e, "gateway refused cancellation");
                        self.record_refusal(&app, order_id, &input, scope, &e).await?;
                        drop(guard);
                        self.locks.release(order_id);
                        return Err(e);
                    }
                }
            }
            CancelType::Request => {
                match self.gateway.request_cancellation(&mul_no, scope, &memo).await {
                    Ok(reply) => {
                        self.audit
                            .record(
                                app.id,
                                order_id,
                                PaymentAction::CancellationRequested,
                                SignalChannel::CancelConfirmation,
                                app.trade_id.as_deref(),
                                Some(json!({
                                    "memo": memo,
                                    "payback_bank": reply.payback_bank,
                                    "payback_price": reply.payback_price,
                                })),
                            )
                            .await?;

                        info!("cancellation request queued at gateway");
                        (
                            CancellationStatus::Pending,
                            reply.message,
                            Some(PaymentEventKind::CancellationRequested),
                        )
                    }
                    Err(e) => {
                        warn!(error = %e, "gateway refused cancellation request");
                        self.record_refusal(&app, order_id, &input, scope, &e).await?;
                        drop(guard);
                        self.locks.release(order_id);
                        return Err(e);
                    }
                }
            }
        };

        let record = self
            .record_cancellation(&app, order_id, &input, scope, status, gateway_message)
            .await?;

        drop(guard);
        self.locks.release(order_id);

        if let Some(kind) = event_kind {
            let event = PaymentEvent {
                kind,
                order_id: order_id.to_string(),
                applicant_name: app.name.clone(),
                contact: app.contact.clone(),
                amount: scope.amount().unwrap_or(app.amount),
                certificates: app.certificate_names(),
                message: input.reason.clone(),
            };
            self.notifier.notify(&event).await;
        }

        Ok(record)
    }

    /// Cancellation history for one order, newest first.
    pub async fn list(
        &self,
        order_id: &str,
    ) -> Result<Vec<payment_cancellation::Model>, ServiceError> {
        let rows = payment_cancellation::Entity::find()
            .filter(payment_cancellation::Column::OrderId.eq(order_id))
            .order_by_desc(payment_cancellation::Column::CreatedAt)
            .all(&*self.db)
            .await?;
        Ok(rows)
    }

    /// A refused cancellation still leaves a trail: a rejected history row
    /// and one audit entry, before the error propagates to the caller.
    async fn record_refusal(
        &self,
        app: &application::Model,
        order_id: &str,
        input: &CancelPaymentInput,
        scope: CancelScope,
        error: &ServiceError,
    ) -> Result<(), ServiceError> {
        self.record_cancellation(
            app,
            order_id,
            input,
            scope,
            CancellationStatus::Rejected,
            Some(error.to_string()),
        )
        .await?;

        let action = match input.cancel_type {
            CancelType::Full => PaymentAction::CancelFullFailed,
            CancelType::Partial => PaymentAction::CancelPartialFailed,
            CancelType::Request => PaymentAction::CancelRequestFailed,
        };
        self.audit
            .record(
                app.id,
                order_id,
                action,
                SignalChannel::CancelConfirmation,
                app.trade_id.as_deref(),
                Some(json!({
                    "amount": scope.amount(),
                    "error": error.to_string(),
                })),
            )
            .await?;

        Ok(())
    }

    async fn record_cancellation(
        &self,
        app: &application::Model,
        order_id: &str,
        input: &CancelPaymentInput,
        scope: CancelScope,
        status: CancellationStatus,
        gateway_message: Option<String>,
    ) -> Result<payment_cancellation::Model, ServiceError> {
        let row = payment_cancellation::ActiveModel {
            id: Set(Uuid::new_v4()),
            application_id: Set(app.id),
            order_id: Set(order_id.to_string()),
            mul_no: Set(app.mul_no.clone()),
            cancel_type: Set(input.cancel_type.as_str().to_string()),
            amount: Set(scope.amount()),
            reason: Set(input.reason.clone()),
            status: Set(status.as_str().to_string()),
            gateway_message: Set(gateway_message),
            created_at: Set(Utc::now()),
        };

        let model = row.insert(&*self.db).await?;
        Ok(model)
    }
}
