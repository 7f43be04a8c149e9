//! Payments API
//!
//! Order creation, checkout verification, history and coupon preview.

use std::sync::Arc;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::common::{rfc3339, ApiResponse};
use crate::api::middleware::{ApiJson, Authenticated, OptionalJson};
use crate::domain::{Payment, PaymentStatus};
use crate::error::PlatformError;
use crate::service::{CouponCheck, OrderCreated, PaymentService, VerifyPayment};

/// Payment response DTO. Amounts are in minor currency units.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub order_id: String,
    pub student_id: String,
    pub original_amount: i64,
    pub discount_amount: i64,
    pub amount: i64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coupon_used: Option<String>,
    pub receipt: String,
    pub status: PaymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<String>,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            order_id: p.order_id,
            student_id: p.student_id,
            original_amount: p.original_amount,
            discount_amount: p.discount_amount,
            amount: p.amount,
            currency: p.currency,
            coupon_used: p.coupon_used,
            receipt: p.receipt,
            status: p.status,
            payment_id: p.payment_id,
            created_at: p.created_at.to_rfc3339(),
            paid_at: rfc3339(p.paid_at),
        }
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub coupon_code: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApplyCouponRequest {
    #[serde(default)]
    pub coupon_code: String,
}

#[derive(Clone)]
pub struct PaymentsState {
    pub service: Arc<PaymentService>,
}

/// Create a gateway order for the caller
#[utoipa::path(
    post,
    path = "/api/payments/create-order",
    tag = "payments",
    request_body = CreateOrderRequest,
    responses(
        (status = 200, description = "Order created", body = OrderCreated),
        (status = 400, description = "Student not eligible for payment"),
        (status = 404, description = "Student not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_order(
    State(state): State<PaymentsState>,
    auth: Authenticated,
    OptionalJson(body): OptionalJson<CreateOrderRequest>,
) -> Result<Json<ApiResponse<OrderCreated>>, PlatformError> {
    let req = body.unwrap_or_default();
    let order = state.service.create_order(&auth.0, req.coupon_code.as_deref()).await?;
    Ok(ApiResponse::ok(order))
}

/// Verify a checkout callback and capture the payment
#[utoipa::path(
    post,
    path = "/api/payments/verify",
    tag = "payments",
    request_body = VerifyPayment,
    responses(
        (status = 200, description = "Payment verified", body = PaymentResponse),
        (status = 400, description = "Payment verification failed"),
        (status = 403, description = "Access denied"),
        (status = 404, description = "Payment not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_payment(
    State(state): State<PaymentsState>,
    auth: Authenticated,
    ApiJson(req): ApiJson<VerifyPayment>,
) -> Result<Json<ApiResponse<PaymentResponse>>, PlatformError> {
    let payment = state.service.verify(&auth.0, &req).await?;
    Ok(ApiResponse::ok_with_message(payment.into(), "Payment verified successfully"))
}

/// The caller's payments, newest first
#[utoipa::path(
    get,
    path = "/api/payments/history",
    tag = "payments",
    responses(
        (status = 200, description = "Payment history", body = Vec<PaymentResponse>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn payment_history(
    State(state): State<PaymentsState>,
    auth: Authenticated,
) -> Result<Json<ApiResponse<Vec<PaymentResponse>>>, PlatformError> {
    let payments = state.service.history(&auth.0).await?;
    Ok(ApiResponse::ok(payments.into_iter().map(Into::into).collect()))
}

/// Preview a coupon's effect on the course fee
#[utoipa::path(
    post,
    path = "/api/payments/apply-coupon",
    tag = "payments",
    request_body = ApplyCouponRequest,
    responses(
        (status = 200, description = "Coupon evaluated", body = CouponCheck),
        (status = 400, description = "Coupon code is required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn apply_coupon(
    State(state): State<PaymentsState>,
    _auth: Authenticated,
    ApiJson(req): ApiJson<ApplyCouponRequest>,
) -> Result<Json<ApiResponse<CouponCheck>>, PlatformError> {
    let check = state.service.apply_coupon(&req.coupon_code)?;
    Ok(ApiResponse::ok(check))
}

pub fn payments_router(state: PaymentsState) -> Router {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/verify", post(verify_payment))
        .route("/history", get(payment_history))
        .route("/apply-coupon", post(apply_coupon))
        .with_state(state)
}
