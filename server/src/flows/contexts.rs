// kart_server/src/flows/contexts.rs

//! Context data carried through each flow. Handlers receive these wrapped in
//! `kartflow::ContextData`; every field a compensator needs is recorded here
//! as soon as the corresponding write succeeds.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{CartItem, Coupon, Order, OrderItem, PaymentIntentView, ShippingAddress};
use crate::services::gateway::GatewayOrder;
use crate::services::orders::CheckoutRequest;
use crate::state::AppState;

/// Cart → pending order.
#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub request: CheckoutRequest,
  /// Assigned up front so coupon holds and gateway receipts can refer to it.
  pub order_id: Uuid,
  pub now: DateTime<Utc>,

  pub shipping: Option<ShippingAddress>,
  /// Sorted by product id.
  pub cart_lines: Vec<CartItem>,
  /// Lines whose stock has been taken, in reservation order.
  pub reserved: Vec<OrderItem>,
  pub held_coupon: Option<Coupon>,
  /// Normalized coupon code whose redemption row this checkout inserted.
  pub inserted_redemption: Option<String>,
  pub gateway_order: Option<GatewayOrder>,
  pub order: Option<Order>,
  pub payment: Option<PaymentIntentView>,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, request: CheckoutRequest) -> Self {
    let now = app_state.clock.now();
    Self {
      app_state,
      user_id,
      request,
      order_id: Uuid::new_v4(),
      now,
      shipping: None,
      cart_lines: Vec::new(),
      reserved: Vec::new(),
      held_coupon: None,
      inserted_redemption: None,
      gateway_order: None,
      order: None,
      payment: None,
    }
  }

  pub fn items_total_minor(&self) -> i64 {
    Order::items_total_minor(&self.reserved)
  }

  pub fn discount_minor(&self) -> i64 {
    self
      .held_coupon
      .as_ref()
      .map_or(0, |c| c.discount_minor.min(self.items_total_minor()))
  }

  pub fn amount_due_minor(&self) -> i64 {
    (self.items_total_minor() - self.discount_minor()).max(0)
  }
}

/// Gateway intent for an existing pending order.
#[derive(Clone)]
pub struct IntentCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub order_id: Uuid,
  pub now: DateTime<Utc>,

  pub order: Option<Order>,
  pub amount_minor: i64,
  pub intent_claimed: bool,
  pub gateway_order: Option<GatewayOrder>,
  pub view: Option<PaymentIntentView>,
}

impl IntentCtxData {
  pub fn new(app_state: AppState, user_id: Uuid, order_id: Uuid) -> Self {
    let now = app_state.clock.now();
    Self {
      app_state,
      user_id,
      order_id,
      now,
      order: None,
      amount_minor: 0,
      intent_claimed: false,
      gateway_order: None,
      view: None,
    }
  }
}

/// The single pending → paid transition and its side effects.
#[derive(Clone)]
pub struct ConfirmCtxData {
  pub app_state: AppState,
  pub user_id: Uuid,
  pub order_id: Uuid,
  pub payment_id: Option<String>,
  pub coupon_code: Option<String>,
  /// Wallet amount to debit before the transition; `None` for gateway payments.
  pub wallet_debit_minor: Option<i64>,
  pub now: DateTime<Utc>,

  pub wallet_debited: bool,
  /// Set when another caller (or the reaper) moved the order first.
  pub lost_race: bool,
  pub paid_order: Option<Order>,
  pub cashback_minor: i64,
  pub coupon_consumed: bool,
  pub intent_settled: bool,
}

impl ConfirmCtxData {
  pub fn new(app_state: AppState, order: &Order, payment_id: Option<String>, wallet_debit_minor: Option<i64>) -> Self {
    let now = app_state.clock.now();
    Self {
      app_state,
      user_id: order.user_id,
      order_id: order.id,
      payment_id,
      coupon_code: order.coupon_code.clone(),
      wallet_debit_minor,
      now,
      wallet_debited: false,
      lost_race: false,
      paid_order: None,
      cashback_minor: 0,
      coupon_consumed: false,
      intent_settled: false,
    }
  }
}
