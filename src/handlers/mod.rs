pub mod applications;
pub mod cancellations;
pub mod payment_webhooks;
pub mod payments;

use crate::db::DbPool;
use crate::gateway::PaymentGateway;
use crate::services::notifications::NotificationSink;
use crate::services::{
    ApplicationService, CancellationService, OrderLocks, PaymentLogService, ReconciliationService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub applications: Arc<ApplicationService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub cancellations: Arc<CancellationService>,
    pub audit: PaymentLogService,
}

impl AppServices {
    /// Wire up the service graph. The reconciliation and cancellation
    /// services share one OrderLocks instance so both paths serialize on the
    /// same per-order mutex.
    pub fn new(
        db_pool: Arc<DbPool>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        let locks = Arc::new(OrderLocks::new());
        let audit = PaymentLogService::new(db_pool.clone());

        let applications = Arc::new(ApplicationService::new(
            db_pool.clone(),
            gateway.clone(),
            audit.clone(),
        ));
        let reconciliation = Arc::new(ReconciliationService::new(
            db_pool.clone(),
            locks.clone(),
            audit.clone(),
            notifier.clone(),
        ));
        let cancellations = Arc::new(CancellationService::new(
            db_pool,
            locks,
            audit.clone(),
            notifier,
            gateway,
        ));

        Self {
            applications,
            reconciliation,
            cancellations,
            audit,
        }
    }
}
