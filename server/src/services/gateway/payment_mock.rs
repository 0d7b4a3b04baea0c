// kart_server/src/services/gateway/payment_mock.rs

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

use super::{sign, signature_matches, GatewayError, GatewayOrder, PaymentGateway};

/// Local gateway: issues `mock_order_*` ids and signs with a shared secret,
/// using the same signature scheme as the real one.
#[derive(Debug)]
pub struct MockGateway {
  secret: String,
  unavailable: AtomicBool,
  latency_ms: AtomicU64,
}

impl MockGateway {
  pub fn new(secret: impl Into<String>) -> Self {
    Self {
      secret: secret.into(),
      unavailable: AtomicBool::new(false),
      latency_ms: AtomicU64::new(0),
    }
  }

  /// Signature a client would receive after paying `order_ref`.
  pub fn sign(&self, order_ref: &str, payment_id: &str) -> String {
    sign(&self.secret, order_ref, payment_id)
  }

  /// While set, `create_order` fails.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  /// Simulated network latency for `create_order`.
  pub fn set_latency(&self, latency: Duration) {
    self.latency_ms.store(latency.as_millis() as u64, Ordering::SeqCst);
  }
}

#[async_trait]
impl PaymentGateway for MockGateway {
  fn key_id(&self) -> &str {
    "mock_key"
  }

  #[instrument(name = "gateway::create_order", skip(self))]
  async fn create_order(&self, amount_minor: i64, currency: &str, receipt: &str) -> Result<GatewayOrder, GatewayError> {
    let latency = self.latency_ms.load(Ordering::SeqCst);
    if latency > 0 {
      tokio::time::sleep(Duration::from_millis(latency)).await;
    }
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(GatewayError::Unavailable);
    }
    if amount_minor <= 0 {
      return Err(GatewayError::Rejected {
        status: 400,
        body: "amount must be positive".to_string(),
      });
    }

    let id = format!("mock_order_{}", Uuid::new_v4().simple());
    info!(external_order_id = %id, "Mock gateway order created.");
    Ok(GatewayOrder {
      id,
      amount_minor,
      currency: currency.to_string(),
    })
  }

  fn verify_signature(&self, external_order_id: &str, payment_id: &str, signature: &str) -> bool {
    signature_matches(&self.secret, external_order_id, payment_id, signature)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn mock_orders_verify_with_own_signature() {
    let gateway = MockGateway::new("s3cret");
    let order = gateway.create_order(49_900, "INR", "rcpt_1").await.unwrap();
    assert!(order.id.starts_with("mock_order_"));
    let sig = gateway.sign(&order.id, "pay_1");
    assert!(gateway.verify_signature(&order.id, "pay_1", &sig));
    assert!(!gateway.verify_signature("mock_order_other", "pay_1", &sig));
  }

  #[tokio::test]
  async fn unavailable_switch_fails_create() {
    let gateway = MockGateway::new("s3cret");
    gateway.set_unavailable(true);
    assert!(matches!(
      gateway.create_order(100, "INR", "r").await,
      Err(GatewayError::Unavailable)
    ));
  }
}
