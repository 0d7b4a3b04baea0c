// kart_server/src/services/gateway/mod.rs

//! Payment gateway seam: create an external order, verify a payment signature.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::{AppConfig, GatewayKind};
use crate::errors::{AppError, Result};

mod payment_mock;
mod razorpay;

pub use payment_mock::MockGateway;
pub use razorpay::RazorpayGateway;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum GatewayError {
  #[error("gateway request failed: {0}")]
  Transport(String),

  #[error("gateway rejected the request with status {status}: {body}")]
  Rejected { status: u16, body: String },

  #[error("malformed gateway response: {0}")]
  Malformed(String),

  #[error("gateway is not accepting requests")]
  Unavailable,
}

/// An order opened on the gateway side.
#[derive(Debug, Clone)]
pub struct GatewayOrder {
  pub id: String,
  pub amount_minor: i64,
  pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
  /// Public key id handed to the client checkout widget.
  fn key_id(&self) -> &str;

  async fn create_order(
    &self,
    amount_minor: i64,
    currency: &str,
    receipt: &str,
  ) -> std::result::Result<GatewayOrder, GatewayError>;

  fn verify_signature(&self, external_order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Hex HMAC-SHA256 over `"{order_ref}|{payment_id}"`.
pub fn sign(secret: &str, order_ref: &str, payment_id: &str) -> String {
  // HMAC accepts keys of any length.
  let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
    Ok(mac) => mac,
    Err(_) => return String::new(),
  };
  mac.update(format!("{}|{}", order_ref, payment_id).as_bytes());
  hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn signature_matches(secret: &str, order_ref: &str, payment_id: &str, signature: &str) -> bool {
  let Ok(provided) = hex::decode(signature.trim()) else {
    return false;
  };
  let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
    return false;
  };
  mac.update(format!("{}|{}", order_ref, payment_id).as_bytes());
  mac.verify_slice(&provided).is_ok()
}

/// Runs a gateway call under `timeout`, folding both failure kinds into
/// `GatewayUnavailable`.
pub async fn call_with_timeout<T>(
  timeout: Duration,
  call: impl Future<Output = std::result::Result<T, GatewayError>>,
) -> Result<T> {
  match tokio::time::timeout(timeout, call).await {
    Ok(Ok(value)) => Ok(value),
    Ok(Err(e)) => {
      warn!(error = %e, "Gateway call failed.");
      Err(AppError::GatewayUnavailable(e.to_string()))
    }
    Err(_) => {
      warn!(timeout_ms = timeout.as_millis() as u64, "Gateway call timed out.");
      Err(AppError::GatewayUnavailable(format!(
        "no response within {} ms",
        timeout.as_millis()
      )))
    }
  }
}

/// Builds the gateway selected by `PAYMENT_GATEWAY`.
pub fn from_config(cfg: &AppConfig) -> Result<Arc<dyn PaymentGateway>> {
  let gateway: Arc<dyn PaymentGateway> = match cfg.gateway {
    GatewayKind::Mock => Arc::new(MockGateway::new(cfg.mock_gateway_secret.clone())),
    GatewayKind::Razorpay => Arc::new(RazorpayGateway::new(
      cfg.razorpay_base_url.clone(),
      cfg.razorpay_key_id.clone(),
      cfg.razorpay_key_secret.clone(),
      cfg.gateway_timeout,
    )?),
  };
  Ok(gateway)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn signature_round_trips_and_rejects_tampering() {
    let sig = sign("secret", "order_abc", "pay_123");
    assert_eq!(sig.len(), 64);
    assert!(signature_matches("secret", "order_abc", "pay_123", &sig));
    assert!(!signature_matches("secret", "order_abc", "pay_124", &sig));
    assert!(!signature_matches("other", "order_abc", "pay_123", &sig));
    assert!(!signature_matches("secret", "order_abc", "pay_123", "not-hex"));
  }

  #[tokio::test]
  async fn slow_call_becomes_gateway_unavailable() {
    let slow = async {
      tokio::time::sleep(Duration::from_millis(200)).await;
      Ok::<_, GatewayError>(())
    };
    let err = call_with_timeout(Duration::from_millis(10), slow).await.unwrap_err();
    assert!(matches!(err, AppError::GatewayUnavailable(_)));
  }
}
