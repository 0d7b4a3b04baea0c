// kart_server/src/models/coupon.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Coupon {
  pub code: String,
  pub discount_minor: i64,
  pub description: String,
  pub is_active: bool,
}

/// One row per `(user_id, code)`, ever.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CouponRedemption {
  pub user_id: Uuid,
  pub code: String,
  /// Pending order currently holding the coupon.
  pub order_id: Option<Uuid>,
  pub redeemed_at: DateTime<Utc>,
  pub consumed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CouponListing {
  pub code: String,
  pub discount_minor: i64,
  pub description: String,
  pub is_used: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppliedCoupon {
  pub code: String,
  pub discount_minor: i64,
}

/// Reference coupons present in every deployment: code, discount, description.
pub const DEFAULT_COUPONS: [(&str, i64, &str); 4] = [
  ("WELCOME100", 10_000, "Flat 100 off on your first order"),
  ("SAVE100", 10_000, "Save 100 on your first purchase"),
  ("FIRSTBUY100", 10_000, "100 off for first-time buyers"),
  ("NEWUSER100", 10_000, "New user special: 100 off"),
];
