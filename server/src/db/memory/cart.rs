// kart_server/src/db/memory/cart.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use super::Faults;
use crate::db::{CartStore, StoreResult};
use crate::models::CartItem;

pub struct MemoryCartStore {
  items: Mutex<Vec<CartItem>>,
  faults: Arc<Faults>,
}

impl MemoryCartStore {
  pub fn new(faults: Arc<Faults>) -> Self {
    Self {
      items: Mutex::new(Vec::new()),
      faults,
    }
  }
}

#[async_trait]
impl CartStore for MemoryCartStore {
  async fn lines(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
    self.faults.check("cart.lines")?;
    let mut lines: Vec<CartItem> = self.items.lock().iter().filter(|i| i.user_id == user_id).cloned().collect();
    lines.sort_by(|a, b| b.added_at.cmp(&a.added_at).then(b.id.cmp(&a.id)));
    Ok(lines)
  }

  async fn line(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<Option<CartItem>> {
    self.faults.check("cart.line")?;
    Ok(
      self
        .items
        .lock()
        .iter()
        .find(|i| i.user_id == user_id && i.id == item_id)
        .cloned(),
    )
  }

  async fn upsert_clamped(
    &self,
    user_id: Uuid,
    product_id: Uuid,
    qty: i32,
    cap: i32,
    now: DateTime<Utc>,
  ) -> StoreResult<CartItem> {
    self.faults.check("cart.upsert")?;
    let mut items = self.items.lock();
    if let Some(existing) = items.iter_mut().find(|i| i.user_id == user_id && i.product_id == product_id) {
      existing.quantity = existing.quantity.saturating_add(qty).min(cap);
      existing.updated_at = now;
      return Ok(existing.clone());
    }
    let item = CartItem {
      id: Uuid::new_v4(),
      user_id,
      product_id,
      quantity: qty.min(cap),
      added_at: now,
      updated_at: now,
    };
    items.push(item.clone());
    Ok(item)
  }

  async fn set_quantity(
    &self,
    user_id: Uuid,
    item_id: Uuid,
    qty: i32,
    now: DateTime<Utc>,
  ) -> StoreResult<Option<CartItem>> {
    self.faults.check("cart.set_quantity")?;
    let mut items = self.items.lock();
    Ok(items.iter_mut().find(|i| i.user_id == user_id && i.id == item_id).map(|item| {
      item.quantity = qty;
      item.updated_at = now;
      item.clone()
    }))
  }

  async fn remove(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<bool> {
    self.faults.check("cart.remove")?;
    let mut items = self.items.lock();
    let before = items.len();
    items.retain(|i| !(i.user_id == user_id && i.id == item_id));
    Ok(items.len() < before)
  }

  async fn clear(&self, user_id: Uuid) -> StoreResult<u64> {
    self.faults.check("cart.clear")?;
    let mut items = self.items.lock();
    let before = items.len();
    items.retain(|i| i.user_id != user_id);
    Ok((before - items.len()) as u64)
  }
}
