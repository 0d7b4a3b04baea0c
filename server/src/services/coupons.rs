// kart_server/src/services/coupons.rs

use std::collections::HashSet;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{AppliedCoupon, Coupon, CouponListing};
use crate::state::AppState;

pub fn normalize_code(code: &str) -> String {
  code.trim().to_ascii_uppercase()
}

async fn active_coupon(state: &AppState, code: &str) -> Result<Coupon> {
  match state.stores.coupons.coupon(code).await? {
    Some(coupon) if coupon.is_active => Ok(coupon),
    _ => Err(AppError::InvalidCoupon(code.to_string())),
  }
}

async fn ensure_new_customer(state: &AppState, user_id: Uuid) -> Result<()> {
  if state.stores.orders.count_paid(user_id).await? > 0 {
    return Err(AppError::NotEligibleForCoupon);
  }
  Ok(())
}

/// Records the user's one-time use of `code`. A concurrent second apply of
/// the same code loses on the `(user, code)` key.
#[instrument(name = "coupons::apply", skip(state))]
pub async fn apply(state: &AppState, user_id: Uuid, code: &str) -> Result<AppliedCoupon> {
  let code = normalize_code(code);
  let coupon = active_coupon(state, &code).await?;
  ensure_new_customer(state, user_id).await?;

  if !state
    .stores
    .coupons
    .insert_redemption(user_id, &code, state.clock.now())
    .await?
  {
    return Err(AppError::CouponAlreadyUsed(code));
  }
  info!(%code, discount_minor = coupon.discount_minor, "Coupon applied.");
  Ok(AppliedCoupon {
    code,
    discount_minor: coupon.discount_minor,
  })
}

/// Active coupons with the caller's `is_used` flag.
#[instrument(name = "coupons::list", skip(state))]
pub async fn list(state: &AppState, user_id: Uuid) -> Result<Vec<CouponListing>> {
  let used: HashSet<String> = state
    .stores
    .coupons
    .redemptions_for_user(user_id)
    .await?
    .into_iter()
    .map(|r| r.code)
    .collect();
  let coupons = state.stores.coupons.active_coupons().await?;
  Ok(
    coupons
      .into_iter()
      .map(|c| CouponListing {
        is_used: used.contains(&c.code),
        code: c.code,
        discount_minor: c.discount_minor,
        description: c.description,
      })
      .collect(),
  )
}

/// Makes sure the user has a redemption row for `code` that a checkout can
/// hold. The flag is true when this call inserted the row.
#[instrument(name = "coupons::prepare_redemption", skip(state))]
pub async fn prepare_redemption(state: &AppState, user_id: Uuid, code: &str) -> Result<(Coupon, bool)> {
  let code = normalize_code(code);
  let coupon = active_coupon(state, &code).await?;
  ensure_new_customer(state, user_id).await?;

  match state.stores.coupons.redemption(user_id, &code).await? {
    Some(existing) if existing.consumed_at.is_some() => Err(AppError::CouponAlreadyUsed(code)),
    Some(_) => Ok((coupon, false)),
    // Losing this insert race leaves the row in place; the hold decides who gets it.
    None => {
      let inserted = state
        .stores
        .coupons
        .insert_redemption(user_id, &code, state.clock.now())
        .await?;
      Ok((coupon, inserted))
    }
  }
}

/// Ties the user's redemption of `code` to a pending order.
#[instrument(name = "coupons::hold_for_order", skip(state))]
pub async fn hold_for_order(state: &AppState, user_id: Uuid, code: &str, order_id: Uuid) -> Result<()> {
  if !state.stores.coupons.hold(user_id, code, order_id).await? {
    warn!(%code, "Coupon is held by another order or already consumed.");
    return Err(AppError::CouponAlreadyUsed(code.to_string()));
  }
  Ok(())
}

/// Undoes a `prepare_redemption` insert, unless the row has since been held
/// or consumed.
#[instrument(name = "coupons::discard_redemption", skip(state))]
pub async fn discard_redemption(state: &AppState, user_id: Uuid, code: &str) -> Result<bool> {
  Ok(state.stores.coupons.delete_unheld_redemption(user_id, code).await?)
}

#[instrument(name = "coupons::release_hold", skip(state))]
pub async fn release_hold(state: &AppState, user_id: Uuid, code: &str, order_id: Uuid) -> Result<bool> {
  Ok(state.stores.coupons.release_hold(user_id, code, order_id).await?)
}

#[instrument(name = "coupons::consume", skip(state))]
pub async fn consume(state: &AppState, user_id: Uuid, code: &str, order_id: Uuid) -> Result<bool> {
  Ok(
    state
      .stores
      .coupons
      .consume(user_id, code, order_id, state.clock.now())
      .await?,
  )
}

#[instrument(name = "coupons::unconsume", skip(state))]
pub async fn unconsume(state: &AppState, user_id: Uuid, code: &str, order_id: Uuid) -> Result<bool> {
  Ok(state.stores.coupons.unconsume(user_id, code, order_id).await?)
}
