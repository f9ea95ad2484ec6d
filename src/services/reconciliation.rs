use crate::db::DbPool;
use crate::entities::application::{self, PaymentStatus};
use crate::errors::ServiceError;
use crate::gateway::{GatewaySignalState, PaymentSignal, SignalChannel};
use crate::services::audit::{PaymentAction, PaymentLogService};
use crate::services::notifications::{NotificationSink, PaymentEvent, PaymentEventKind};
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, instrument, warn};

/// Per-order mutual exclusion.
///
/// The browser redirect, the server webhook and an operator cancel can all
/// arrive for the same order at once. Everything that reads-then-writes an
/// application must hold this lock for the duration of the read and write.
#[derive(Default)]
pub struct OrderLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, order_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(order_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops the map entry once nobody holds or awaits the lock. The strong
    /// count check runs under the shard lock, so a concurrent `acquire`
    /// either already cloned the Arc (count > 1, entry kept) or will insert
    /// a fresh one.
    pub fn release(&self, order_id: &str) {
        self.locks
            .remove_if(order_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Result of reconciling one payment signal against the stored record.
#[derive(Clone, Debug)]
pub enum ReconcileOutcome {
    /// The signal moved the record to a new status.
    Applied {
        status: PaymentStatus,
        application: application::Model,
    },
    /// Repeat of an already-applied signal; the record is untouched.
    DuplicateIgnored { application: application::Model },
    /// The signal contradicts a terminal record; rejected, record untouched.
    Conflict { current: PaymentStatus },
    /// The signal carried no usable state; record untouched.
    Ambiguous,
    /// No application exists for the signalled order id.
    UnknownOrder,
}

/// Applies gateway payment signals to application records.
///
/// Transition rules: pending may move to paid or failed; paid may move to
/// cancelled only through the operator cancel path. Any other requested move
/// is a conflict and is refused.
#[derive(Clone)]
pub struct ReconciliationService {
    db: Arc<DbPool>,
    locks: Arc<OrderLocks>,
    audit: PaymentLogService,
    notifier: Arc<dyn NotificationSink>,
}

impl ReconciliationService {
    pub fn new(
        db: Arc<DbPool>,
        locks: Arc<OrderLocks>,
        audit: PaymentLogService,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            db,
            locks,
            audit,
            notifier,
        }
    }

    /// Reconciles one signal. Safe to call any number of times with the same
    /// signal; repeats are absorbed as duplicates.
    #[instrument(skip(self, signal), fields(channel = %channel.as_str(), order_id))]
    pub async fn reconcile(
        &self,
        signal: &PaymentSignal,
        channel: SignalChannel,
    ) -> Result<ReconcileOutcome, ServiceError> {
        let order_id = signal.order_id.as_deref().ok_or_else(|| {
            ServiceError::BadRequest("payment signal carries no order id".into())
        })?;
        tracing::Span::current().record("order_id", order_id);

        let guard = self.locks.acquire(order_id).await;

        let Some(app) = application::Entity::find()
            .filter(application::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?
        else {
            warn!("payment signal for unknown order");
            drop(guard);
            self.locks.release(order_id);
            return Ok(ReconcileOutcome::UnknownOrder);
        };

        let current = app.payment_status();

        let (outcome, event) = match signal.state {
            GatewaySignalState::Unknown => {
                warn!(status = current.as_str(), "ambiguous payment signal, no state field");
                self.audit
                    .record(
                        app.id,
                        order_id,
                        PaymentAction::AmbiguousSignal,
                        channel,
                        signal.trade_id.as_deref(),
                        Some(signal.raw.clone()),
                    )
                    .await?;
                (ReconcileOutcome::Ambiguous, None)
            }
            GatewaySignalState::Success => self.apply_success(app, signal, channel).await?,
            GatewaySignalState::Failure => self.apply_failure(app, signal, channel).await?,
        };

        // Notify only after the write is committed and the lock released, so
        // a slow Slack cannot extend the critical section.
        drop(guard);
        self.locks.release(order_id);
        if let Some(event) = event {
            self.notifier.notify(&event).await;
        }

        Ok(outcome)
    }

    async fn apply_success(
        &self,
        app: application::Model,
        signal: &PaymentSignal,
        channel: SignalChannel,
    ) -> Result<(ReconcileOutcome, Option<PaymentEvent>), ServiceError> {
        let current = app.payment_status();
        let order_id = app.order_id.clone();

        match current {
            PaymentStatus::Pending => {
                let now = Utc::now();
                let mut active: application::ActiveModel = app.clone().into();
                active.payment_status = Set(PaymentStatus::Paid.as_str().to_string());
                active.trade_id = Set(signal.trade_id.clone());
                active.pay_method = Set(signal.pay_method.clone());
                active.paid_at = Set(Some(now));
                active.updated_at = Set(now);
                if signal.mul_no.is_some() {
                    active.mul_no = Set(signal.mul_no.clone());
                }
                let updated = active.update(&*self.db).await?;

                self.audit
                    .record(
                        updated.id,
                        &order_id,
                        PaymentAction::PaymentSuccess,
                        channel,
                        signal.trade_id.as_deref(),
                        Some(signal.raw.clone()),
                    )
                    .await?;

                info!(trade_id = ?signal.trade_id, "payment confirmed");

                let event = PaymentEvent {
                    kind: PaymentEventKind::Confirmed,
                    order_id,
                    applicant_name: updated.name.clone(),
                    contact: updated.contact.clone(),
                    amount: updated.amount,
                    certificates: updated.certificate_names(),
                    message: None,
                };
                Ok((
                    ReconcileOutcome::Applied {
                        status: PaymentStatus::Paid,
                        application: updated,
                    },
                    Some(event),
                ))
            }
            PaymentStatus::Paid => {
                // A retried webhook resends the same trade id; a different
                // trade id on a paid order is a genuinely contradictory claim.
                let is_duplicate = match (&signal.trade_id, &app.trade_id) {
                    (Some(incoming), Some(stored)) => incoming == stored,
                    (None, _) => true,
                    (Some(_), None) => false,
                };

                if is_duplicate {
                    self.audit
                        .record(
                            app.id,
                            &order_id,
                            PaymentAction::DuplicateIgnored,
                            channel,
                            signal.trade_id.as_deref(),
                            Some(signal.raw.clone()),
                        )
                        .await?;
                    info!("duplicate success signal ignored");
                    Ok((ReconcileOutcome::DuplicateIgnored { application: app }, None))
                } else {
                    self.reject_conflict(app, signal, channel).await
                }
            }
            PaymentStatus::Failed | PaymentStatus::Cancelled => {
                self.reject_conflict(app, signal, channel).await
            }
        }
    }

    async fn apply_failure(
        &self,
        app: application::Model,
        signal: &PaymentSignal,
        channel: SignalChannel,
    ) -> Result<(ReconcileOutcome, Option<PaymentEvent>), ServiceError> {
        let current = app.payment_status();
        let order_id = app.order_id.clone();

        match current {
            PaymentStatus::Pending => {
                let now = Utc::now();
                let mut active: application::ActiveModel = app.clone().into();
                active.payment_status = Set(PaymentStatus::Failed.as_str().to_string());
                active.failed_at = Set(Some(now));
                active.failed_message = Set(signal.message.clone());
                active.updated_at = Set(now);
                let updated = active.update(&*self.db).await?;

                self.audit
                    .record(
                        updated.id,
                        &order_id,
                        PaymentAction::PaymentFailed,
                        channel,
                        signal.trade_id.as_deref(),
                        Some(signal.raw.clone()),
                    )
                    .await?;

                info!(message = ?signal.message, "payment failed");

                let event = PaymentEvent {
                    kind: PaymentEventKind::Failed,
                    order_id,
                    applicant_name: updated.name.clone(),
                    contact: updated.contact.clone(),
                    amount: updated.amount,
                    certificates: updated.certificate_names(),
                    message: signal.message.clone(),
                };
                Ok((
                    ReconcileOutcome::Applied {
                        status: PaymentStatus::Failed,
                        application: updated,
                    },
                    Some(event),
                ))
            }
            PaymentStatus::Failed => {
                self.audit
                    .record(
                        app.id,
                        &order_id,
                        PaymentAction::DuplicateIgnored,
                        channel,
                        signal.trade_id.as_deref(),
                        Some(signal.raw.clone()),
                    )
                    .await?;
                info!("duplicate failure signal ignored");
                Ok((ReconcileOutcome::DuplicateIgnored { application: app }, None))
            }
            PaymentStatus::Paid | PaymentStatus::Cancelled => {
                self.reject_conflict(app, signal, channel).await
            }
        }
    }

    async fn reject_conflict(
        &self,
        app: application::Model,
        signal: &PaymentSignal,
        channel: SignalChannel,
    ) -> Result<(ReconcileOutcome, Option<PaymentEvent>), ServiceError> {
        let current = app.payment_status();
        warn!(
            status = current.as_str(),
            trade_id = ?signal.trade_id,
            "conflicting payment signal rejected"
        );

        self.audit
            .record(
                app.id,
                &app.order_id,
                PaymentAction::ConflictingSignal,
                channel,
                signal.trade_id.as_deref(),
                Some(signal.raw.clone()),
            )
            .await?;

        Ok((ReconcileOutcome::Conflict { current }, None))
    }
}
