// tests/common/mod.rs
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use kart_server::clock::ManualClock;
use kart_server::config::AppConfig;
use kart_server::db::memory::MemoryBackend;
use kart_server::errors::{AppError, Result};
use kart_server::flows::register_all_flows;
use kart_server::models::{Address, AddressDraft, PaymentMethod, Product};
use kart_server::services::gateway::MockGateway;
use kart_server::services::orders::{self, AddressChoice, CheckoutOutcome, CheckoutRequest};
use kart_server::services::payments::PaymentConfirmation;
use kart_server::services::{addresses, cart};
use kart_server::state::AppState;
use kartflow::Flows;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use uuid::Uuid;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub fn start_time() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
}

/// An `AppState` over memory stores, with handles to the pieces tests poke.
pub struct TestApp {
  pub state: AppState,
  pub backend: MemoryBackend,
  pub gateway: Arc<MockGateway>,
  pub clock: Arc<ManualClock>,
}

pub fn test_config() -> AppConfig {
  AppConfig {
    gateway_timeout: Duration::from_millis(200),
    ..AppConfig::default()
  }
}

pub fn test_app() -> TestApp {
  test_app_with(test_config())
}

pub fn test_app_with(config: AppConfig) -> TestApp {
  setup_tracing();
  let backend = MemoryBackend::new();
  let gateway = Arc::new(MockGateway::new(config.mock_gateway_secret.clone()));
  let clock = Arc::new(ManualClock::new(start_time()));
  let flows = Arc::new(Flows::<AppError>::new());
  let state = AppState {
    stores: backend.stores(),
    gateway: gateway.clone(),
    clock: clock.clone(),
    config: Arc::new(config),
    flows: flows.clone(),
  };
  register_all_flows(&flows, &state);
  TestApp {
    state,
    backend,
    gateway,
    clock,
  }
}

pub fn sample_draft() -> AddressDraft {
  AddressDraft {
    full_name: "Asha Rao".into(),
    phone: "9876543210".into(),
    pincode: "560001".into(),
    address_line1: "12 MG Road".into(),
    address_line2: None,
    landmark: None,
    city: "Bengaluru".into(),
    state: "Karnataka".into(),
    country: "India".into(),
    address_type: "Home".into(),
    is_default: false,
  }
}

impl TestApp {
  pub fn seed_product(&self, name: &str, price_minor: i64, stock: i32) -> Uuid {
    let id = Uuid::new_v4();
    self.set_product(id, name, price_minor, stock);
    id
  }

  pub fn set_product(&self, id: Uuid, name: &str, price_minor: i64, stock: i32) {
    self.backend.catalog.upsert_product(Product {
      id,
      name: name.to_string(),
      price_minor,
      stock,
      category_id: None,
      image_url: None,
      updated_at: start_time(),
    });
  }

  pub fn stock_of(&self, product_id: Uuid) -> i32 {
    self.backend.catalog.stock_of(product_id).unwrap_or(-1)
  }

  pub async fn add_to_cart(&self, user_id: Uuid, product_id: Uuid, qty: i32) {
    cart::add(&self.state, user_id, product_id, qty).await.unwrap();
  }

  pub async fn save_address(&self, user_id: Uuid) -> Address {
    addresses::create(&self.state, user_id, sample_draft()).await.unwrap()
  }

  pub async fn checkout(
    &self,
    user_id: Uuid,
    payment_method: PaymentMethod,
    coupon_code: Option<&str>,
  ) -> Result<CheckoutOutcome> {
    orders::checkout(
      &self.state,
      user_id,
      CheckoutRequest {
        address: AddressChoice::Inline(sample_draft()),
        coupon_code: coupon_code.map(str::to_string),
        payment_method,
      },
    )
    .await
  }

  /// What the client would send back after paying the outcome's gateway order.
  pub fn confirmation_for(&self, outcome: &CheckoutOutcome, payment_id: &str) -> PaymentConfirmation {
    let external = outcome
      .payment
      .as_ref()
      .map(|p| p.external_order_id.clone())
      .unwrap_or_default();
    self.confirmation(outcome.order.id, &external, payment_id)
  }

  pub fn confirmation(&self, order_id: Uuid, external_order_id: &str, payment_id: &str) -> PaymentConfirmation {
    PaymentConfirmation {
      order_id,
      external_order_id: external_order_id.to_string(),
      payment_id: payment_id.to_string(),
      signature: self.gateway.sign(external_order_id, payment_id),
    }
  }
}
