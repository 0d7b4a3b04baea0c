// kart_server/src/db/postgres/cart.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{CartStore, StoreResult};
use crate::models::CartItem;

const CART_COLUMNS: &str = "id, user_id, product_id, quantity, added_at, updated_at";

pub struct PostgresCartStore {
  pool: PgPool,
}

impl PostgresCartStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl CartStore for PostgresCartStore {
  async fn lines(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>> {
    let sql = format!("SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 ORDER BY added_at DESC, id DESC");
    Ok(
      sqlx::query_as::<_, CartItem>(&sql)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?,
    )
  }

  async fn line(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<Option<CartItem>> {
    let sql = format!("SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 AND id = $2");
    Ok(
      sqlx::query_as::<_, CartItem>(&sql)
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?,
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
    let sql = format!(
      "INSERT INTO cart_items (id, user_id, product_id, quantity, added_at, updated_at) \
       VALUES ($1, $2, $3, LEAST($4, $5), $6, $6) \
       ON CONFLICT (user_id, product_id) DO UPDATE \
       SET quantity = LEAST(cart_items.quantity + $4, $5), updated_at = $6 \
       RETURNING {CART_COLUMNS}"
    );
    Ok(
      sqlx::query_as::<_, CartItem>(&sql)
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(product_id)
        .bind(qty)
        .bind(cap)
        .bind(now)
        .fetch_one(&self.pool)
        .await?,
    )
  }

  async fn set_quantity(
    &self,
    user_id: Uuid,
    item_id: Uuid,
    qty: i32,
    now: DateTime<Utc>,
  ) -> StoreResult<Option<CartItem>> {
    let sql = format!(
      "UPDATE cart_items SET quantity = $3, updated_at = $4 WHERE user_id = $1 AND id = $2 RETURNING {CART_COLUMNS}"
    );
    Ok(
      sqlx::query_as::<_, CartItem>(&sql)
        .bind(user_id)
        .bind(item_id)
        .bind(qty)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?,
    )
  }

  async fn remove(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND id = $2")
      .bind(user_id)
      .bind(item_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn clear(&self, user_id: Uuid) -> StoreResult<u64> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
      .bind(user_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected())
  }
}
