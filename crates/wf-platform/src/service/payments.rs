//! Payment workflow
//!
//! Orders are requested from the gateway for shortlisted students. A checkout
//! callback is accepted only when its signature recomputes; capture marks the
//! payment paid and activates the student in one write.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;
use wf_common::{NotificationKind, OutboxItem};

use crate::config::PricingConfig;
use crate::domain::{Payment, PaymentStatus, Student};
use crate::error::{PlatformError, Result};
use crate::repository::{CaptureOutcome, PaymentRepository, StudentRepository, UnitOfWork};
use crate::service::authorization::AuthContext;
use crate::service::gateway::{OrderRequest, PaymentGateway};
use crate::service::invoice::InvoiceGenerator;
use crate::service::signature::verify_payment_signature;

const MAX_RECEIPT_LEN: usize = 40;

/// Order handed to the checkout widget.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreated {
    pub order_id: String,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
}

/// Checkout callback fields, named as the gateway sends them.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct VerifyPayment {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CouponCheck {
    pub valid: bool,
    pub discount: i64,
    pub final_price: i64,
}

pub struct PaymentService {
    payments: Arc<dyn PaymentRepository>,
    students: Arc<dyn StudentRepository>,
    unit_of_work: Arc<dyn UnitOfWork>,
    gateway: Arc<dyn PaymentGateway>,
    invoices: Option<Arc<InvoiceGenerator>>,
    pricing: PricingConfig,
}

impl PaymentService {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        students: Arc<dyn StudentRepository>,
        unit_of_work: Arc<dyn UnitOfWork>,
        gateway: Arc<dyn PaymentGateway>,
        pricing: PricingConfig,
    ) -> Self {
        Self {
            payments,
            students,
            unit_of_work,
            gateway,
            invoices: None,
            pricing,
        }
    }

    pub fn with_invoices(mut self, invoices: Arc<InvoiceGenerator>) -> Self {
        self.invoices = Some(invoices);
        self
    }

    pub async fn create_order(&self, ctx: &AuthContext, coupon: Option<&str>) -> Result<OrderCreated> {
        let student = self.find_student(&ctx.uid).await?;
        if !student.is_eligible_for_payment() {
            return Err(PlatformError::policy("Student not eligible for payment"));
        }

        let quote = self.pricing.quote(coupon);
        let now = Utc::now();
        let request = OrderRequest {
            amount: quote.final_amount_minor(),
            currency: self.pricing.currency.clone(),
            receipt: receipt(&ctx.uid, now.timestamp_millis()),
            notes: BTreeMap::from([
                ("studentId".to_string(), student.uid.clone()),
                ("couponUsed".to_string(), quote.coupon_applied.clone().unwrap_or_default()),
                ("discountAmount".to_string(), (quote.discount * 100).to_string()),
            ]),
        };

        let order = self.gateway.create_order(&request).await?;

        let payment = Payment {
            order_id: order.id.clone(),
            uid: ctx.uid.clone(),
            student_id: student.uid.clone(),
            original_amount: quote.original_price * 100,
            discount_amount: quote.discount * 100,
            amount: order.amount,
            currency: order.currency.clone(),
            coupon_used: quote.coupon_applied,
            receipt: request.receipt,
            status: PaymentStatus::Created,
            payment_id: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
        };
        self.payments.insert(&payment).await?;

        metrics::counter!("wf_payment_orders_created_total").increment(1);
        info!(uid = %ctx.uid, order_id = %order.id, amount = order.amount, "Payment order created");

        Ok(OrderCreated {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
            key_id: self.gateway.key_id().map(str::to_string),
        })
    }

    /// Signature first: nothing is read or written for a forged callback.
    pub async fn verify(&self, ctx: &AuthContext, callback: &VerifyPayment) -> Result<Payment> {
        let authentic = verify_payment_signature(
            self.gateway.signing_secret(),
            &callback.razorpay_order_id,
            &callback.razorpay_payment_id,
            &callback.razorpay_signature,
        );
        if !authentic {
            metrics::counter!("wf_payment_signature_rejected_total").increment(1);
            warn!(uid = %ctx.uid, order_id = %callback.razorpay_order_id, "Payment signature mismatch");
            return Err(PlatformError::SignatureMismatch);
        }

        let mut payment = self
            .payments
            .find_by_order_id(&callback.razorpay_order_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Payment", &callback.razorpay_order_id))?;
        if payment.uid != ctx.uid {
            return Err(PlatformError::forbidden("Access denied"));
        }

        if payment.is_paid() {
            return if payment.payment_id.as_deref() == Some(callback.razorpay_payment_id.as_str()) {
                Ok(payment)
            } else {
                Err(PlatformError::validation("Payment has already been processed"))
            };
        }

        let mut student = self.find_student(&payment.student_id).await?;
        let now = Utc::now();
        payment.mark_paid(&callback.razorpay_payment_id, now);
        student.activate_after_payment(now);

        let event = OutboxItem::new(
            NotificationKind::PaymentCaptured,
            &payment.order_id,
            &student.details.email,
            json!({
                "fullName": student.details.full_name,
                "paymentId": callback.razorpay_payment_id,
                "currency": payment.currency,
                "amount": payment.amount / 100,
                "paidOn": now.format("%Y-%m-%d").to_string(),
            }),
        );

        match self.unit_of_work.capture_payment(&payment, &student.uid, &event, now).await? {
            CaptureOutcome::Captured => {
                metrics::counter!("wf_payments_verified_total").increment(1);
                info!(uid = %ctx.uid, order_id = %payment.order_id, "Payment captured, internship activated");
                self.issue_invoice(&payment, &student).await;
            }
            CaptureOutcome::AlreadyCaptured => {
                info!(order_id = %payment.order_id, "Payment already captured");
            }
        }

        Ok(payment)
    }

    async fn issue_invoice(&self, payment: &Payment, student: &Student) {
        if let Some(invoices) = &self.invoices {
            if let Err(e) = invoices.generate(payment, student).await {
                warn!(order_id = %payment.order_id, error = %e, "Invoice generation failed");
            }
        }
    }

    pub async fn history(&self, ctx: &AuthContext) -> Result<Vec<Payment>> {
        self.payments.find_by_uid(&ctx.uid).await
    }

    pub fn apply_coupon(&self, code: &str) -> Result<CouponCheck> {
        if code.trim().is_empty() {
            return Err(PlatformError::validation("Coupon code is required"));
        }
        let quote = self.pricing.quote(Some(code));
        Ok(CouponCheck {
            valid: quote.coupon_applied.is_some(),
            discount: quote.discount,
            final_price: quote.final_price,
        })
    }

    async fn find_student(&self, uid: &str) -> Result<Student> {
        self.students
            .find_by_uid(uid)
            .await?
            .ok_or_else(|| PlatformError::not_found("Student", uid))
    }
}

fn receipt(uid: &str, millis: i64) -> String {
    let prefix: String = uid.chars().filter(char::is_ascii_alphanumeric).take(12).collect();
    let mut receipt = format!("rcpt_{}_{}", prefix, millis);
    receipt.truncate(MAX_RECEIPT_LEN);
    receipt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ApplicantDetails, Application, StudentPaymentStatus, StudentStatus};
    use crate::repository::MemoryStore;
    use crate::service::gateway::LocalGateway;
    use crate::service::signature::payment_signature;

    const SECRET: &str = "test-key-secret";

    fn ctx(uid: &str) -> AuthContext {
        AuthContext {
            uid: uid.to_string(),
            email: None,
            is_admin: false,
        }
    }

    async fn shortlisted(store: &MemoryStore, uid: &str) {
        let app = Application::new(
            uid,
            ApplicantDetails {
                full_name: "Asha Rao".to_string(),
                email: "a@x.com".to_string(),
                ..Default::default()
            },
        );
        let event = OutboxItem::new(NotificationKind::ApplicationSubmitted, &app.id, "a@x.com", json!({}));
        store.submit_application(&app, &event).await.unwrap();
        let now = Utc::now();
        store
            .shortlist_application(&app.id, &Student::from_application(&app, now), &event, now)
            .await
            .unwrap();
    }

    fn service(store: &MemoryStore) -> PaymentService {
        let store = Arc::new(store.clone());
        PaymentService::new(
            store.clone(),
            store.clone(),
            store,
            Arc::new(LocalGateway::new(SECRET)),
            PricingConfig::default(),
        )
    }

    fn callback(order_id: &str, payment_id: &str) -> VerifyPayment {
        VerifyPayment {
            razorpay_order_id: order_id.to_string(),
            razorpay_payment_id: payment_id.to_string(),
            razorpay_signature: payment_signature(SECRET, order_id, payment_id),
        }
    }

    #[test]
    fn test_receipt_is_bounded() {
        let r = receipt("a-very-long-identity-provider-uid-0123456789", 1_700_000_000_000);
        assert!(r.len() <= MAX_RECEIPT_LEN);
        assert!(r.starts_with("rcpt_averylongide_"));
    }

    #[tokio::test]
    async fn test_order_amounts_follow_coupon() {
        let store = MemoryStore::new();
        shortlisted(&store, "u1").await;
        let svc = service(&store);

        let full = svc.create_order(&ctx("u1"), None).await.unwrap();
        assert_eq!(full.amount, 39_900);
        assert_eq!(full.currency, "INR");

        let discounted = svc.create_order(&ctx("u1"), Some("top100")).await.unwrap();
        assert_eq!(discounted.amount, 29_900);

        let history = svc.history(&ctx("u1")).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|p| p.status == PaymentStatus::Created));
    }

    #[tokio::test]
    async fn test_only_shortlisted_students_may_order() {
        let store = MemoryStore::new();
        let svc = service(&store);

        let err = svc.create_order(&ctx("nobody"), None).await.unwrap_err();
        assert!(matches!(err, PlatformError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_forged_signature_changes_nothing() {
        let store = MemoryStore::new();
        shortlisted(&store, "u1").await;
        let svc = service(&store);
        let order = svc.create_order(&ctx("u1"), None).await.unwrap();

        let mut forged = callback(&order.order_id, "pay_1");
        forged.razorpay_payment_id = "pay_2".to_string();
        let err = svc.verify(&ctx("u1"), &forged).await.unwrap_err();
        assert!(matches!(err, PlatformError::SignatureMismatch));

        let student = StudentRepository::find_by_uid(&store, "u1").await.unwrap().unwrap();
        assert_eq!(student.payment_status, StudentPaymentStatus::Pending);
        assert!(store.outbox_items().iter().all(|i| i.kind != NotificationKind::PaymentCaptured));
    }

    #[tokio::test]
    async fn test_verified_payment_activates_student_once() {
        let store = MemoryStore::new();
        shortlisted(&store, "u1").await;
        let svc = service(&store);
        let order = svc.create_order(&ctx("u1"), None).await.unwrap();

        let paid = svc.verify(&ctx("u1"), &callback(&order.order_id, "pay_1")).await.unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);

        let student = StudentRepository::find_by_uid(&store, "u1").await.unwrap().unwrap();
        assert_eq!(student.payment_status, StudentPaymentStatus::Paid);
        assert_eq!(student.status, StudentStatus::Active);
        assert!(student.progress_percentage >= 60);

        // Redelivered callback is accepted without a second capture
        svc.verify(&ctx("u1"), &callback(&order.order_id, "pay_1")).await.unwrap();
        let captured = store
            .outbox_items()
            .iter()
            .filter(|i| i.kind == NotificationKind::PaymentCaptured)
            .count();
        assert_eq!(captured, 1);

        let other = svc.verify(&ctx("u1"), &callback(&order.order_id, "pay_9")).await;
        assert!(matches!(other, Err(PlatformError::Validation { .. })));

        // No longer eligible for another order
        let err = svc.create_order(&ctx("u1"), None).await.unwrap_err();
        assert!(matches!(err, PlatformError::Policy { .. }));
    }

    #[tokio::test]
    async fn test_capture_keeps_edits_made_after_the_read() {
        let store = MemoryStore::new();
        shortlisted(&store, "u1").await;
        let svc = service(&store);
        let order = svc.create_order(&ctx("u1"), None).await.unwrap();

        let mut payment = PaymentRepository::find_by_order_id(&store, &order.order_id)
            .await
            .unwrap()
            .unwrap();

        // An administrator edits the record after verification loaded it
        let mut edited = StudentRepository::find_by_uid(&store, "u1").await.unwrap().unwrap();
        edited.progress_percentage = 80;
        edited.profile.batch_name = Some("Batch 7".to_string());
        StudentRepository::update(&store, &edited).await.unwrap();

        let now = Utc::now();
        payment.mark_paid("pay_1", now);
        let event = OutboxItem::new(NotificationKind::PaymentCaptured, &payment.order_id, "a@x.com", json!({}));
        let outcome = store.capture_payment(&payment, "u1", &event, now).await.unwrap();
        assert_eq!(outcome, CaptureOutcome::Captured);

        let student = StudentRepository::find_by_uid(&store, "u1").await.unwrap().unwrap();
        assert_eq!(student.status, StudentStatus::Active);
        assert_eq!(student.payment_status, StudentPaymentStatus::Paid);
        assert_eq!(student.progress_percentage, 80);
        assert_eq!(student.profile.batch_name.as_deref(), Some("Batch 7"));
        assert!(student.progress_steps.internship_active);
        assert_eq!(student.enrollment_date, Some(now));
    }

    #[tokio::test]
    async fn test_foreign_order_is_forbidden() {
        let store = MemoryStore::new();
        shortlisted(&store, "u1").await;
        let svc = service(&store);
        let order = svc.create_order(&ctx("u1"), None).await.unwrap();

        let err = svc
            .verify(&ctx("u2"), &callback(&order.order_id, "pay_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Forbidden { .. }));
    }

    #[test]
    fn test_apply_coupon() {
        let svc = service(&MemoryStore::new());
        assert_eq!(
            svc.apply_coupon("Top100").unwrap(),
            CouponCheck { valid: true, discount: 100, final_price: 299 }
        );
        assert_eq!(
            svc.apply_coupon("NOPE").unwrap(),
            CouponCheck { valid: false, discount: 0, final_price: 399 }
        );
        assert!(svc.apply_coupon("  ").is_err());
    }
}
