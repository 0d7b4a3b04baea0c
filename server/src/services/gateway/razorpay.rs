// kart_server/src/services/gateway/razorpay.rs

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{signature_matches, GatewayError, GatewayOrder, PaymentGateway};
use crate::errors::{AppError, Result};

#[derive(Serialize)]
struct CreateOrderBody<'a> {
  amount: i64,
  currency: &'a str,
  receipt: &'a str,
}

#[derive(Deserialize)]
struct CreateOrderResponse {
  id: String,
  amount: i64,
  currency: String,
}

/// Razorpay-compatible orders API over HTTPS with basic auth.
pub struct RazorpayGateway {
  client: Client,
  base_url: String,
  key_id: String,
  key_secret: String,
}

impl RazorpayGateway {
  pub fn new(base_url: String, key_id: String, key_secret: String, timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .build()
      .map_err(|e| AppError::Config(format!("failed to build gateway HTTP client: {}", e)))?;
    Ok(Self {
      client,
      base_url,
      key_id,
      key_secret,
    })
  }
}

#[async_trait]
impl PaymentGateway for RazorpayGateway {
  fn key_id(&self) -> &str {
    &self.key_id
  }

  #[instrument(name = "gateway::create_order", skip(self))]
  async fn create_order(
    &self,
    amount_minor: i64,
    currency: &str,
    receipt: &str,
  ) -> std::result::Result<GatewayOrder, GatewayError> {
    let response = self
      .client
      .post(format!("{}/v1/orders", self.base_url))
      .basic_auth(&self.key_id, Some(&self.key_secret))
      .json(&CreateOrderBody {
        amount: amount_minor,
        currency,
        receipt,
      })
      .send()
      .await
      .map_err(|e| GatewayError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(GatewayError::Rejected {
        status: status.as_u16(),
        body,
      });
    }

    let created: CreateOrderResponse = response
      .json()
      .await
      .map_err(|e| GatewayError::Malformed(e.to_string()))?;
    debug!(external_order_id = %created.id, "Gateway order created.");
    Ok(GatewayOrder {
      id: created.id,
      amount_minor: created.amount,
      currency: created.currency,
    })
  }

  fn verify_signature(&self, external_order_id: &str, payment_id: &str, signature: &str) -> bool {
    signature_matches(&self.key_secret, external_order_id, payment_id, signature)
  }
}
