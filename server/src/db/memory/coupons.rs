// kart_server/src/db/memory/coupons.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::Faults;
use crate::db::{CouponStore, StoreResult};
use crate::models::coupon::DEFAULT_COUPONS;
use crate::models::{Coupon, CouponRedemption};

#[derive(Default)]
struct CouponState {
  coupons: HashMap<String, Coupon>,
  redemptions: HashMap<(Uuid, String), CouponRedemption>,
}

pub struct MemoryCouponStore {
  state: Mutex<CouponState>,
  faults: Arc<Faults>,
}

impl MemoryCouponStore {
  pub fn new(faults: Arc<Faults>) -> Self {
    Self {
      state: Mutex::new(CouponState::default()),
      faults,
    }
  }

  pub fn with_default_coupons(faults: Arc<Faults>) -> Self {
    let store = Self::new(faults);
    for (code, discount_minor, description) in DEFAULT_COUPONS {
      store.upsert_coupon(Coupon {
        code: code.to_string(),
        discount_minor,
        description: description.to_string(),
        is_active: true,
      });
    }
    store
  }

  pub fn upsert_coupon(&self, coupon: Coupon) {
    self.state.lock().coupons.insert(coupon.code.clone(), coupon);
  }

  /// Applies `f` to the redemption row when `guard` accepts it.
  fn conditional(
    &self,
    user_id: Uuid,
    code: &str,
    guard: impl FnOnce(&CouponRedemption) -> bool,
    f: impl FnOnce(&mut CouponRedemption),
  ) -> bool {
    let mut state = self.state.lock();
    match state.redemptions.get_mut(&(user_id, code.to_string())) {
      Some(row) if guard(row) => {
        f(row);
        true
      }
      _ => false,
    }
  }
}

#[async_trait]
impl CouponStore for MemoryCouponStore {
  async fn coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
    self.faults.check("coupons.coupon")?;
    Ok(self.state.lock().coupons.get(code).cloned())
  }

  async fn active_coupons(&self) -> StoreResult<Vec<Coupon>> {
    self.faults.check("coupons.active")?;
    let mut coupons: Vec<Coupon> = self.state.lock().coupons.values().filter(|c| c.is_active).cloned().collect();
    coupons.sort_by(|a, b| a.code.cmp(&b.code));
    Ok(coupons)
  }

  async fn redemptions_for_user(&self, user_id: Uuid) -> StoreResult<Vec<CouponRedemption>> {
    self.faults.check("coupons.redemptions_for_user")?;
    Ok(
      self
        .state
        .lock()
        .redemptions
        .values()
        .filter(|r| r.user_id == user_id)
        .cloned()
        .collect(),
    )
  }

  async fn redemption(&self, user_id: Uuid, code: &str) -> StoreResult<Option<CouponRedemption>> {
    self.faults.check("coupons.redemption")?;
    Ok(self.state.lock().redemptions.get(&(user_id, code.to_string())).cloned())
  }

  async fn insert_redemption(&self, user_id: Uuid, code: &str, now: DateTime<Utc>) -> StoreResult<bool> {
    self.faults.check("coupons.insert_redemption")?;
    let mut state = self.state.lock();
    let key = (user_id, code.to_string());
    if state.redemptions.contains_key(&key) {
      return Ok(false);
    }
    state.redemptions.insert(
      key,
      CouponRedemption {
        user_id,
        code: code.to_string(),
        order_id: None,
        redeemed_at: now,
        consumed_at: None,
      },
    );
    Ok(true)
  }

  async fn delete_unheld_redemption(&self, user_id: Uuid, code: &str) -> StoreResult<bool> {
    self.faults.check("coupons.delete_unheld_redemption")?;
    let mut state = self.state.lock();
    let key = (user_id, code.to_string());
    match state.redemptions.get(&key) {
      Some(r) if r.order_id.is_none() && r.consumed_at.is_none() => {
        state.redemptions.remove(&key);
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn hold(&self, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool> {
    self.faults.check("coupons.hold")?;
    Ok(self.conditional(
      user_id,
      code,
      |r| r.order_id.is_none() && r.consumed_at.is_none(),
      |r| r.order_id = Some(order_id),
    ))
  }

  async fn release_hold(&self, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool> {
    self.faults.check("coupons.release_hold")?;
    Ok(self.conditional(
      user_id,
      code,
      |r| r.order_id == Some(order_id) && r.consumed_at.is_none(),
      |r| r.order_id = None,
    ))
  }

  async fn consume(&self, user_id: Uuid, code: &str, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
    self.faults.check("coupons.consume")?;
    Ok(self.conditional(
      user_id,
      code,
      |r| r.order_id == Some(order_id) && r.consumed_at.is_none(),
      |r| r.consumed_at = Some(now),
    ))
  }

  async fn unconsume(&self, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool> {
    self.faults.check("coupons.unconsume")?;
    Ok(self.conditional(
      user_id,
      code,
      |r| r.order_id == Some(order_id) && r.consumed_at.is_some(),
      |r| r.consumed_at = None,
    ))
  }
}
