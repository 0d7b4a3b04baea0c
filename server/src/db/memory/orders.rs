// kart_server/src/db/memory/orders.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::Faults;
use crate::db::{OrderStore, StoreError, StoreResult};
use crate::models::{IntentStatus, Order, OrderStatus, PaymentIntent};

#[derive(Default)]
struct OrdersState {
  orders: HashMap<Uuid, Order>,
  intents: HashMap<Uuid, PaymentIntent>,
}

pub struct MemoryOrderStore {
  state: Mutex<OrdersState>,
  faults: Arc<Faults>,
}

impl MemoryOrderStore {
  pub fn new(faults: Arc<Faults>) -> Self {
    Self {
      state: Mutex::new(OrdersState::default()),
      faults,
    }
  }

  /// Applies `f` to a pending order and returns the updated copy.
  fn transition_pending(
    &self,
    order_id: Uuid,
    guard: impl FnOnce(&Order) -> bool,
    f: impl FnOnce(&mut Order),
  ) -> Option<Order> {
    let mut state = self.state.lock();
    let order = state.orders.get_mut(&order_id)?;
    if order.status != OrderStatus::Pending || !guard(order) {
      return None;
    }
    f(order);
    Some(order.clone())
  }
}

fn oldest_first(orders: &mut [Order]) {
  orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
  async fn insert(&self, order: &Order, intent: Option<&PaymentIntent>) -> StoreResult<()> {
    self.faults.check("orders.insert")?;
    let mut state = self.state.lock();
    if state.orders.contains_key(&order.id) {
      return Err(StoreError::Conflict(format!("order {} already exists", order.id)));
    }
    state.orders.insert(order.id, order.clone());
    if let Some(intent) = intent {
      state.intents.insert(intent.order_id, intent.clone());
    }
    Ok(())
  }

  async fn get(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    self.faults.check("orders.get")?;
    Ok(self.state.lock().orders.get(&order_id).cloned())
  }

  async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
    self.faults.check("orders.list")?;
    let mut orders: Vec<Order> = self
      .state
      .lock()
      .orders
      .values()
      .filter(|o| o.user_id == user_id)
      .cloned()
      .collect();
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    Ok(orders)
  }

  async fn count_paid(&self, user_id: Uuid) -> StoreResult<i64> {
    self.faults.check("orders.count_paid")?;
    let count = self
      .state
      .lock()
      .orders
      .values()
      .filter(|o| o.user_id == user_id && o.status.counts_as_paid())
      .count();
    Ok(count as i64)
  }

  async fn mark_paid(
    &self,
    order_id: Uuid,
    payment_id: Option<&str>,
    now: DateTime<Utc>,
  ) -> StoreResult<Option<Order>> {
    self.faults.check("orders.mark_paid")?;
    Ok(self.transition_pending(
      order_id,
      |o| !o.is_expired_at(now),
      |o| {
        o.status = OrderStatus::Paid;
        o.payment_id = payment_id.map(str::to_string);
        o.updated_at = now;
      },
    ))
  }

  async fn revert_paid(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
    self.faults.check("orders.revert_paid")?;
    let mut state = self.state.lock();
    match state.orders.get_mut(&order_id) {
      Some(order) if order.status == OrderStatus::Paid => {
        order.status = OrderStatus::Pending;
        order.payment_id = None;
        order.updated_at = now;
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn cancel(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Order>> {
    self.faults.check("orders.cancel")?;
    Ok(self.transition_pending(
      order_id,
      |_| true,
      |o| {
        o.status = OrderStatus::Cancelled;
        o.updated_at = now;
      },
    ))
  }

  async fn expire(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Order>> {
    self.faults.check("orders.expire")?;
    Ok(self.transition_pending(
      order_id,
      |o| o.is_expired_at(now),
      |o| {
        o.status = OrderStatus::Cancelled;
        o.updated_at = now;
      },
    ))
  }

  async fn claim_stock_release(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
    self.faults.check("orders.claim_stock_release")?;
    let mut state = self.state.lock();
    match state.orders.get_mut(&order_id) {
      Some(order) if order.status == OrderStatus::Cancelled && order.stock_reserved => {
        order.stock_reserved = false;
        order.updated_at = now;
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn expired_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Order>> {
    self.faults.check("orders.expired_pending")?;
    let mut orders: Vec<Order> = self
      .state
      .lock()
      .orders
      .values()
      .filter(|o| o.status == OrderStatus::Pending && o.is_expired_at(now))
      .cloned()
      .collect();
    oldest_first(&mut orders);
    orders.truncate(limit.max(0) as usize);
    Ok(orders)
  }

  async fn stranded_reservations(&self, limit: i64) -> StoreResult<Vec<Order>> {
    self.faults.check("orders.stranded_reservations")?;
    let mut orders: Vec<Order> = self
      .state
      .lock()
      .orders
      .values()
      .filter(|o| o.status == OrderStatus::Cancelled && o.stock_reserved)
      .cloned()
      .collect();
    oldest_first(&mut orders);
    orders.truncate(limit.max(0) as usize);
    Ok(orders)
  }

  async fn claim_intent(&self, intent: &PaymentIntent) -> StoreResult<bool> {
    self.faults.check("orders.claim_intent")?;
    let mut state = self.state.lock();
    if state.intents.contains_key(&intent.order_id) {
      return Ok(false);
    }
    state.intents.insert(intent.order_id, intent.clone());
    Ok(true)
  }

  async fn attach_intent(
    &self,
    order_id: Uuid,
    external_ref: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> StoreResult<bool> {
    self.faults.check("orders.attach_intent")?;
    let mut state = self.state.lock();
    let order_pending = state
      .orders
      .get(&order_id)
      .is_some_and(|o| o.status == OrderStatus::Pending);
    let intent_creating = state
      .intents
      .get(&order_id)
      .is_some_and(|i| i.status == IntentStatus::Creating);
    if !order_pending || !intent_creating {
      return Ok(false);
    }
    if let Some(intent) = state.intents.get_mut(&order_id) {
      intent.external_ref = Some(external_ref.to_string());
      intent.status = IntentStatus::Created;
    }
    if let Some(order) = state.orders.get_mut(&order_id) {
      order.external_payment_ref = Some(external_ref.to_string());
      order.reservation_expires_at.get_or_insert(expires_at);
      order.updated_at = now;
    }
    Ok(true)
  }

  async fn drop_intent_claim(&self, order_id: Uuid) -> StoreResult<bool> {
    self.faults.check("orders.drop_intent_claim")?;
    let mut state = self.state.lock();
    if state
      .intents
      .get(&order_id)
      .is_some_and(|i| i.status == IntentStatus::Creating)
    {
      state.intents.remove(&order_id);
      return Ok(true);
    }
    Ok(false)
  }

  async fn intent(&self, order_id: Uuid) -> StoreResult<Option<PaymentIntent>> {
    self.faults.check("orders.intent")?;
    Ok(self.state.lock().intents.get(&order_id).cloned())
  }

  async fn settle_intent(&self, order_id: Uuid) -> StoreResult<bool> {
    self.faults.check("orders.settle_intent")?;
    let mut state = self.state.lock();
    match state.intents.get_mut(&order_id) {
      Some(intent) if intent.status == IntentStatus::Created => {
        intent.status = IntentStatus::Paid;
        Ok(true)
      }
      _ => Ok(false),
    }
  }
}
