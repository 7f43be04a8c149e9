//! Payment Entity

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use wf_common::serde_helpers::optional_bson_datetime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Paid,
    Failed,
}

/// One gateway order. Amounts are minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Gateway order identifier
    #[serde(rename = "_id")]
    pub order_id: String,

    /// Payer identity
    pub uid: String,

    /// Owning student record
    pub student_id: String,

    /// Price before any coupon
    pub original_amount: i64,

    pub discount_amount: i64,

    /// Amount requested from the gateway
    pub amount: i64,

    pub currency: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_used: Option<String>,

    pub receipt: String,

    pub status: PaymentStatus,

    /// Gateway payment identifier, set on capture
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,

    #[serde(default, with = "optional_bson_datetime", skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

impl Payment {
    pub fn is_paid(&self) -> bool {
        self.status == PaymentStatus::Paid
    }

    pub fn mark_paid(&mut self, payment_id: impl Into<String>, now: DateTime<Utc>) {
        self.status = PaymentStatus::Paid;
        self.payment_id = Some(payment_id.into());
        self.paid_at = Some(now);
        self.updated_at = now;
    }
}

/// Price breakdown for an order, in major currency units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub original_price: i64,
    pub discount: i64,
    pub final_price: i64,
    /// Coupon code as configured, when one matched
    pub coupon_applied: Option<String>,
}

impl Quote {
    pub fn final_amount_minor(&self) -> i64 {
        self.final_price * 100
    }
}
