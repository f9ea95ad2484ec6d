pub mod applications;
pub mod audit;
pub mod cancellations;
pub mod notifications;
pub mod reconciliation;

pub use applications::ApplicationService;
pub use audit::PaymentLogService;
pub use cancellations::CancellationService;
pub use reconciliation::{OrderLocks, ReconcileOutcome, ReconciliationService};
