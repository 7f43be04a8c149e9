//! Invoice documents for captured payments.

use std::sync::Arc;

use bytes::Bytes;

use crate::domain::{Document, DocumentCategory, Payment, Student};
use crate::error::Result;
use crate::service::documents::DocumentService;

pub struct InvoiceGenerator {
    documents: Arc<DocumentService>,
}

impl InvoiceGenerator {
    pub fn new(documents: Arc<DocumentService>) -> Self {
        Self { documents }
    }

    /// Writes `invoice_<orderId>.txt`. Regenerating replaces the same record.
    pub async fn generate(&self, payment: &Payment, student: &Student) -> Result<Document> {
        let file_name = format!("invoice_{}.txt", payment.order_id);
        let id = format!("invoice_{}", payment.order_id);

        self.documents
            .store_generated(
                &payment.uid,
                DocumentCategory::Invoice,
                &file_name,
                "text/plain",
                Bytes::from(render(payment, student)),
                &id,
            )
            .await
    }
}

fn major(amount_minor: i64) -> String {
    format!("{}.{:02}", amount_minor / 100, (amount_minor % 100).abs())
}

pub fn render(payment: &Payment, student: &Student) -> String {
    let paid_on = payment
        .paid_at
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_default();

    let mut lines = vec![
        "Wyffle Internship Program - Invoice".to_string(),
        String::new(),
        format!("Invoice:      invoice_{}", payment.order_id),
        format!("Billed to:    {} <{}>", student.details.full_name, student.details.email),
        format!("Order ID:     {}", payment.order_id),
        format!("Payment ID:   {}", payment.payment_id.as_deref().unwrap_or("-")),
        format!("Paid on:      {}", paid_on),
        String::new(),
        format!("Course fee:   {} {}", payment.currency, major(payment.original_amount)),
    ];
    if let Some(coupon) = &payment.coupon_used {
        lines.push(format!(
            "Discount:     {} {} (coupon {})",
            payment.currency,
            major(payment.discount_amount),
            coupon
        ));
    }
    lines.push(format!("Amount paid:  {} {}", payment.currency, major(payment.amount)));
    lines.push(String::new());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_units() {
        assert_eq!(major(29_900), "299.00");
        assert_eq!(major(39_950), "399.50");
        assert_eq!(major(5), "0.05");
    }
}
