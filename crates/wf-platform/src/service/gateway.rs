//! Payment gateway client
//!
//! Orders are created in minor currency units. The gateway also owns the key
//! that authenticates checkout callbacks.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::RazorpayConfig;
use crate::error::{PlatformError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    pub notes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder>;

    /// HMAC key for checkout callback signatures
    fn signing_secret(&self) -> &str;

    /// Public key id handed to the checkout widget
    fn key_id(&self) -> Option<&str> {
        None
    }
}

pub struct RazorpayGateway {
    config: RazorpayConfig,
    client: reqwest::Client,
}

impl RazorpayGateway {
    pub fn new(config: RazorpayConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .map_err(|e| PlatformError::configuration(format!("HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
        let url = format!("{}/v1/orders", self.config.api_url.trim_end_matches('/'));
        debug!(receipt = %request.receipt, amount = request.amount, "Creating gateway order");

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(request)
            .send()
            .await
            .map_err(|e| PlatformError::gateway(format!("Order request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Gateway rejected order: {}", body);
            return Err(PlatformError::gateway(format!("HTTP {}: {}", status, body)));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| PlatformError::gateway(format!("Unreadable order response: {}", e)))
    }

    fn signing_secret(&self) -> &str {
        &self.config.key_secret
    }

    fn key_id(&self) -> Option<&str> {
        Some(&self.config.key_id)
    }
}

/// Development gateway that fabricates order ids without network access.
pub struct LocalGateway {
    secret: String,
}

impl LocalGateway {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: secret.into() }
    }
}

#[async_trait]
impl PaymentGateway for LocalGateway {
    async fn create_order(&self, request: &OrderRequest) -> Result<GatewayOrder> {
        Ok(GatewayOrder {
            id: format!("order_{}", uuid::Uuid::new_v4().simple()),
            amount: request.amount,
            currency: request.currency.clone(),
            status: "created".to_string(),
        })
    }

    fn signing_secret(&self) -> &str {
        &self.secret
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{basic_auth, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> OrderRequest {
        OrderRequest {
            amount: 39_900,
            currency: "INR".to_string(),
            receipt: "rcpt_u1_1700000000000".to_string(),
            notes: BTreeMap::from([("studentId".to_string(), "u1".to_string())]),
        }
    }

    fn gateway(server: &MockServer) -> RazorpayGateway {
        RazorpayGateway::new(RazorpayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: "rzp_secret".to_string(),
            api_url: server.uri(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_order_posts_minor_units_with_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .and(basic_auth("rzp_test_key", "rzp_secret"))
            .and(body_partial_json(serde_json::json!({ "amount": 39900, "currency": "INR" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_ABC",
                "entity": "order",
                "amount": 39900,
                "currency": "INR",
                "status": "created"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = gateway(&server).create_order(&request()).await.unwrap();
        assert_eq!(order.id, "order_ABC");
        assert_eq!(order.amount, 39_900);
    }

    #[tokio::test]
    async fn test_gateway_error_is_internal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/orders"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = gateway(&server).create_order(&request()).await.unwrap_err();
        assert!(matches!(err, PlatformError::Gateway { .. }));
    }

    #[tokio::test]
    async fn test_local_gateway_echoes_amount() {
        let order = LocalGateway::new("s").create_order(&request()).await.unwrap();
        assert!(order.id.starts_with("order_"));
        assert_eq!(order.amount, 39_900);
    }
}
