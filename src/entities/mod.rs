pub mod application;
pub mod payment_cancellation;
pub mod payment_log;
