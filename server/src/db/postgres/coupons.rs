// kart_server/src/db/postgres/coupons.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{CouponStore, StoreResult};
use crate::models::{Coupon, CouponRedemption};

const REDEMPTION_COLUMNS: &str = "user_id, code, order_id, redeemed_at, consumed_at";

pub struct PostgresCouponStore {
  pool: PgPool,
}

impl PostgresCouponStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn conditional(&self, sql: &str, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query(sql)
      .bind(user_id)
      .bind(code)
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }
}

#[async_trait]
impl CouponStore for PostgresCouponStore {
  async fn coupon(&self, code: &str) -> StoreResult<Option<Coupon>> {
    Ok(
      sqlx::query_as::<_, Coupon>("SELECT code, discount_minor, description, is_active FROM coupons WHERE code = $1")
        .bind(code)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn active_coupons(&self) -> StoreResult<Vec<Coupon>> {
    Ok(
      sqlx::query_as::<_, Coupon>(
        "SELECT code, discount_minor, description, is_active FROM coupons WHERE is_active ORDER BY code",
      )
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn redemptions_for_user(&self, user_id: Uuid) -> StoreResult<Vec<CouponRedemption>> {
    Ok(
      sqlx::query_as::<_, CouponRedemption>(&format!(
        "SELECT {REDEMPTION_COLUMNS} FROM coupon_redemptions WHERE user_id = $1"
      ))
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn redemption(&self, user_id: Uuid, code: &str) -> StoreResult<Option<CouponRedemption>> {
    Ok(
      sqlx::query_as::<_, CouponRedemption>(&format!(
        "SELECT {REDEMPTION_COLUMNS} FROM coupon_redemptions WHERE user_id = $1 AND code = $2"
      ))
      .bind(user_id)
      .bind(code)
      .fetch_optional(&self.pool)
      .await?,
    )
  }

  async fn insert_redemption(&self, user_id: Uuid, code: &str, now: DateTime<Utc>) -> StoreResult<bool> {
    let result = sqlx::query(
      "INSERT INTO coupon_redemptions (user_id, code, order_id, redeemed_at, consumed_at) \
       VALUES ($1, $2, NULL, $3, NULL) ON CONFLICT (user_id, code) DO NOTHING",
    )
    .bind(user_id)
    .bind(code)
    .bind(now)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn delete_unheld_redemption(&self, user_id: Uuid, code: &str) -> StoreResult<bool> {
    let result = sqlx::query(
      "DELETE FROM coupon_redemptions \
       WHERE user_id = $1 AND code = $2 AND order_id IS NULL AND consumed_at IS NULL",
    )
    .bind(user_id)
    .bind(code)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn hold(&self, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool> {
    self
      .conditional(
        "UPDATE coupon_redemptions SET order_id = $3 \
         WHERE user_id = $1 AND code = $2 AND order_id IS NULL AND consumed_at IS NULL",
        user_id,
        code,
        order_id,
      )
      .await
  }

  async fn release_hold(&self, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool> {
    self
      .conditional(
        "UPDATE coupon_redemptions SET order_id = NULL \
         WHERE user_id = $1 AND code = $2 AND order_id = $3 AND consumed_at IS NULL",
        user_id,
        code,
        order_id,
      )
      .await
  }

  async fn consume(&self, user_id: Uuid, code: &str, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE coupon_redemptions SET consumed_at = $4 \
       WHERE user_id = $1 AND code = $2 AND order_id = $3 AND consumed_at IS NULL",
    )
    .bind(user_id)
    .bind(code)
    .bind(order_id)
    .bind(now)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn unconsume(&self, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool> {
    self
      .conditional(
        "UPDATE coupon_redemptions SET consumed_at = NULL \
         WHERE user_id = $1 AND code = $2 AND order_id = $3 AND consumed_at IS NOT NULL",
        user_id,
        code,
        order_id,
      )
      .await
  }
}
