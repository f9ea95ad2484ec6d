use crate::catalog;
use crate::db::DbPool;
use crate::entities::application::{self, PaymentStatus};
use crate::errors::ServiceError;
use crate::gateway::{PaymentGateway, PaymentRequest, SignalChannel};
use crate::services::audit::{PaymentAction, PaymentLogService};
use chrono::Utc;
use rand::Rng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// New application form input.
#[derive(Clone, Debug, Deserialize, Validate, ToSchema)]
pub struct CreateApplicationInput {
    #[validate(length(min = 1, max = 50, message = "name must be between 1 and 50 characters"))]
    pub name: String,

    #[validate(custom = "validate_phone")]
    pub contact: String,

    #[validate(custom = "validate_birth_prefix")]
    pub birth_prefix: Option<String>,

    #[validate(length(min = 1, max = 200, message = "address is required"))]
    pub address_main: String,

    #[validate(length(max = 200))]
    pub address_detail: Option<String>,

    #[validate(length(max = 10))]
    pub postal_code: Option<String>,

    /// Certificate names from the catalog; at least one, no duplicates.
    #[validate(length(min = 1, message = "select at least one certificate"))]
    pub certificates: Vec<String>,

    pub cash_receipt: Option<String>,
    pub photo_url: Option<String>,
}

fn validate_phone(contact: &str) -> Result<(), ValidationError> {
    let digits = contact.chars().all(|c| c.is_ascii_digit());
    if !digits || contact.len() < 10 || contact.len() > 11 {
        let mut err = ValidationError::new("phone");
        err.message = Some("contact must be a 10-11 digit phone number".into());
        return Err(err);
    }
    Ok(())
}

fn validate_birth_prefix(value: &str) -> Result<(), ValidationError> {
    if value.len() != 6 || !value.chars().all(|c| c.is_ascii_digit()) {
        let mut err = ValidationError::new("birth_prefix");
        err.message = Some("birth prefix must be 6 digits (YYMMDD)".into());
        return Err(err);
    }
    Ok(())
}

/// A submitted application plus the payment window the customer is sent to.
#[derive(Clone, Debug)]
pub struct SubmittedApplication {
    pub application: application::Model,
    pub pay_url: String,
}

/// Intake of certificate applications.
///
/// The amount is always recomputed server-side from the validated selection.
#[derive(Clone)]
pub struct ApplicationService {
    db: Arc<DbPool>,
    gateway: Arc<dyn PaymentGateway>,
    audit: PaymentLogService,
}

impl ApplicationService {
    pub fn new(db: Arc<DbPool>, gateway: Arc<dyn PaymentGateway>, audit: PaymentLogService) -> Self {
        Self { db, gateway, audit }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn submit(
        &self,
        input: CreateApplicationInput,
    ) -> Result<SubmittedApplication, ServiceError> {
        input.validate()?;
        Self::validate_certificates(&input.certificates)?;

        let count = input.certificates.len();
        let amount = catalog::amount_for(count);
        let order_id = generate_order_id();
        let now = Utc::now();

        let record = application::ActiveModel {
            id: Set(Uuid::new_v4()),
            order_id: Set(order_id.clone()),
            name: Set(input.name.clone()),
            contact: Set(input.contact.clone()),
            birth_prefix: Set(input.birth_prefix.clone()),
            address_main: Set(input.address_main.clone()),
            address_detail: Set(input.address_detail.clone()),
            postal_code: Set(input.postal_code.clone()),
            certificates: Set(json!(input.certificates)),
            cash_receipt: Set(input.cash_receipt.clone()),
            photo_url: Set(input.photo_url.clone()),
            payment_status: Set(PaymentStatus::Pending.as_str().to_string()),
            amount: Set(amount),
            trade_id: Set(None),
            mul_no: Set(None),
            pay_method: Set(None),
            paid_at: Set(None),
            failed_at: Set(None),
            failed_message: Set(None),
            cancelled_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = record.insert(&*self.db).await?;

        let request = PaymentRequest {
            order_id: order_id.clone(),
            goods_name: catalog::goods_name(count),
            price: amount,
            recv_phone: input.contact.clone(),
            recv_name: input.name.clone(),
        };
        let reply = self.gateway.create_payment_request(&request).await?;

        let mut active: application::ActiveModel = inserted.into();
        active.mul_no = Set(Some(reply.mul_no.clone()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.audit
            .record(
                updated.id,
                &order_id,
                PaymentAction::PaymentRequested,
                SignalChannel::Operator,
                None,
                Some(json!({ "mul_no": reply.mul_no, "amount": amount })),
            )
            .await?;

        info!(order_id = %order_id, amount, "application submitted, payment window opened");

        Ok(SubmittedApplication {
            application: updated,
            pay_url: reply.pay_url,
        })
    }

    pub async fn get_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<application::Model, ServiceError> {
        application::Entity::find()
            .filter(application::Column::OrderId.eq(order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Application with order id {} not found", order_id))
            })
    }

    fn validate_certificates(names: &[String]) -> Result<(), ServiceError> {
        let mut seen = HashSet::new();
        for name in names {
            if !catalog::contains(name) {
                return Err(ServiceError::ValidationError(format!(
                    "unknown certificate: {}",
                    name
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(ServiceError::ValidationError(format!(
                    "duplicate certificate: {}",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Order ids look like "CERT-20250301120000-A1B2C3": a timestamp for operator
/// readability plus a random suffix for uniqueness.
pub fn generate_order_id() -> String {
    const SUFFIX_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| {
            let idx = rng.gen_range(0..SUFFIX_CHARS.len());
            SUFFIX_CHARS[idx] as char
        })
        .collect();
    format!("CERT-{}-{}", Utc::now().format("%Y%m%d%H%M%S"), suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_ids_have_expected_shape() {
        let id = generate_order_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CERT");
        assert_eq!(parts[1].len(), 14);
        assert_eq!(parts[2].len(), 6);
    }

    #[test]
    fn order_ids_are_unique_enough() {
        let a = generate_order_id();
        let b = generate_order_id();
        assert_ne!(a, b);
    }

    #[test]
    fn unknown_certificate_rejected() {
        let err = ApplicationService::validate_certificates(&["없는자격증".to_string()]);
        assert!(err.is_err());
    }

    #[test]
    fn duplicate_certificate_rejected() {
        let names = vec!["심리상담사1급".to_string(), "심리상담사1급".to_string()];
        assert!(ApplicationService::validate_certificates(&names).is_err());
    }

    #[test]
    fn phone_validation() {
        assert!(validate_phone("01012345678").is_ok());
        assert!(validate_phone("010-1234-5678").is_err());
        assert!(validate_phone("123").is_err());
    }
}
