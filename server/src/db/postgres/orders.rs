// kart_server/src/db/postgres/orders.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::db::{OrderStore, StoreError, StoreResult};
use crate::models::{IntentStatus, Order, OrderItem, PaymentIntent, ShippingAddress};

const ORDER_COLUMNS: &str = "id, user_id, status, payment_method, items, shipping_address, total_minor, \
  discount_minor, amount_due_minor, currency, coupon_code, external_payment_ref, payment_id, \
  reservation_expires_at, stock_reserved, created_at, updated_at";

const INTENT_COLUMNS: &str = "order_id, external_ref, amount_minor, currency, status, created_at";

#[derive(FromRow)]
struct OrderRow {
  id: Uuid,
  user_id: Uuid,
  status: String,
  payment_method: String,
  items: Json<Vec<OrderItem>>,
  shipping_address: Json<ShippingAddress>,
  total_minor: i64,
  discount_minor: i64,
  amount_due_minor: i64,
  currency: String,
  coupon_code: Option<String>,
  external_payment_ref: Option<String>,
  payment_id: Option<String>,
  reservation_expires_at: Option<DateTime<Utc>>,
  stock_reserved: bool,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
  type Error = StoreError;

  fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
    Ok(Order {
      id: row.id,
      user_id: row.user_id,
      status: row.status.parse().map_err(StoreError::Corrupt)?,
      payment_method: row.payment_method.parse().map_err(StoreError::Corrupt)?,
      items: row.items.0,
      shipping_address: row.shipping_address.0,
      total_minor: row.total_minor,
      discount_minor: row.discount_minor,
      amount_due_minor: row.amount_due_minor,
      currency: row.currency,
      coupon_code: row.coupon_code,
      external_payment_ref: row.external_payment_ref,
      payment_id: row.payment_id,
      reservation_expires_at: row.reservation_expires_at,
      stock_reserved: row.stock_reserved,
      created_at: row.created_at,
      updated_at: row.updated_at,
    })
  }
}

#[derive(FromRow)]
struct IntentRow {
  order_id: Uuid,
  external_ref: Option<String>,
  amount_minor: i64,
  currency: String,
  status: String,
  created_at: DateTime<Utc>,
}

impl TryFrom<IntentRow> for PaymentIntent {
  type Error = StoreError;

  fn try_from(row: IntentRow) -> Result<Self, Self::Error> {
    Ok(PaymentIntent {
      order_id: row.order_id,
      external_ref: row.external_ref,
      amount_minor: row.amount_minor,
      currency: row.currency,
      status: row.status.parse().map_err(StoreError::Corrupt)?,
      created_at: row.created_at,
    })
  }
}

fn into_orders(rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
  rows.into_iter().map(Order::try_from).collect()
}

pub struct PostgresOrderStore {
  pool: PgPool,
}

impl PostgresOrderStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn fetch_one_order(&self, sql: &str, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(sql)
      .bind(order_id)
      .bind(now)
      .fetch_optional(&self.pool)
      .await?;
    row.map(Order::try_from).transpose()
  }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
  async fn insert(&self, order: &Order, intent: Option<&PaymentIntent>) -> StoreResult<()> {
    let mut tx = self.pool.begin().await?;
    sqlx::query(&format!(
      "INSERT INTO orders ({ORDER_COLUMNS}) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)"
    ))
    .bind(order.id)
    .bind(order.user_id)
    .bind(order.status.as_str())
    .bind(order.payment_method.as_str())
    .bind(Json(&order.items))
    .bind(Json(&order.shipping_address))
    .bind(order.total_minor)
    .bind(order.discount_minor)
    .bind(order.amount_due_minor)
    .bind(&order.currency)
    .bind(&order.coupon_code)
    .bind(&order.external_payment_ref)
    .bind(&order.payment_id)
    .bind(order.reservation_expires_at)
    .bind(order.stock_reserved)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *tx)
    .await?;

    if let Some(intent) = intent {
      sqlx::query(&format!("INSERT INTO payment_intents ({INTENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"))
        .bind(intent.order_id)
        .bind(&intent.external_ref)
        .bind(intent.amount_minor)
        .bind(&intent.currency)
        .bind(intent.status.as_str())
        .bind(intent.created_at)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
  }

  async fn get(&self, order_id: Uuid) -> StoreResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await?;
    row.map(Order::try_from).transpose()
  }

  async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
      "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(user_id)
    .fetch_all(&self.pool)
    .await?;
    into_orders(rows)
  }

  async fn count_paid(&self, user_id: Uuid) -> StoreResult<i64> {
    let count: i64 = sqlx::query_scalar(
      "SELECT COUNT(*) FROM orders WHERE user_id = $1 AND status IN ('paid', 'shipped', 'delivered')",
    )
    .bind(user_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(count)
  }

  async fn mark_paid(
    &self,
    order_id: Uuid,
    payment_id: Option<&str>,
    now: DateTime<Utc>,
  ) -> StoreResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
      "UPDATE orders SET status = 'paid', payment_id = $3, updated_at = $2 \
       WHERE id = $1 AND status = 'pending' \
         AND (reservation_expires_at IS NULL OR reservation_expires_at > $2) \
       RETURNING {ORDER_COLUMNS}"
    ))
    .bind(order_id)
    .bind(now)
    .bind(payment_id)
    .fetch_optional(&self.pool)
    .await?;
    row.map(Order::try_from).transpose()
  }

  async fn revert_paid(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET status = 'pending', payment_id = NULL, updated_at = $2 WHERE id = $1 AND status = 'paid'",
    )
    .bind(order_id)
    .bind(now)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn cancel(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET status = 'cancelled', updated_at = $2 WHERE id = $1 AND status = 'pending' \
       RETURNING {ORDER_COLUMNS}"
    );
    self.fetch_one_order(&sql, order_id, now).await
  }

  async fn expire(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Order>> {
    let sql = format!(
      "UPDATE orders SET status = 'cancelled', updated_at = $2 \
       WHERE id = $1 AND status = 'pending' AND reservation_expires_at <= $2 \
       RETURNING {ORDER_COLUMNS}"
    );
    self.fetch_one_order(&sql, order_id, now).await
  }

  async fn claim_stock_release(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE orders SET stock_reserved = FALSE, updated_at = $2 \
       WHERE id = $1 AND status = 'cancelled' AND stock_reserved",
    )
    .bind(order_id)
    .bind(now)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn expired_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
      "SELECT {ORDER_COLUMNS} FROM orders \
       WHERE status = 'pending' AND reservation_expires_at <= $1 \
       ORDER BY created_at, id LIMIT $2"
    ))
    .bind(now)
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    into_orders(rows)
  }

  async fn stranded_reservations(&self, limit: i64) -> StoreResult<Vec<Order>> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
      "SELECT {ORDER_COLUMNS} FROM orders WHERE status = 'cancelled' AND stock_reserved \
       ORDER BY created_at, id LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(&self.pool)
    .await?;
    into_orders(rows)
  }

  async fn claim_intent(&self, intent: &PaymentIntent) -> StoreResult<bool> {
    let result = sqlx::query(&format!(
      "INSERT INTO payment_intents ({INTENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
       ON CONFLICT (order_id) DO NOTHING"
    ))
    .bind(intent.order_id)
    .bind(&intent.external_ref)
    .bind(intent.amount_minor)
    .bind(&intent.currency)
    .bind(intent.status.as_str())
    .bind(intent.created_at)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn attach_intent(
    &self,
    order_id: Uuid,
    external_ref: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> StoreResult<bool> {
    let mut tx = self.pool.begin().await?;
    let order = sqlx::query(
      "UPDATE orders SET external_payment_ref = $2, updated_at = $3, \
       reservation_expires_at = COALESCE(reservation_expires_at, $4) \
       WHERE id = $1 AND status = 'pending'",
    )
    .bind(order_id)
    .bind(external_ref)
    .bind(now)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;
    let intent = sqlx::query(
      "UPDATE payment_intents SET external_ref = $2, status = 'created' WHERE order_id = $1 AND status = 'creating'",
    )
    .bind(order_id)
    .bind(external_ref)
    .execute(&mut *tx)
    .await?;

    if order.rows_affected() == 1 && intent.rows_affected() == 1 {
      tx.commit().await?;
      Ok(true)
    } else {
      tx.rollback().await?;
      Ok(false)
    }
  }

  async fn drop_intent_claim(&self, order_id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query("DELETE FROM payment_intents WHERE order_id = $1 AND status = 'creating'")
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn intent(&self, order_id: Uuid) -> StoreResult<Option<PaymentIntent>> {
    let row = sqlx::query_as::<_, IntentRow>(&format!(
      "SELECT {INTENT_COLUMNS} FROM payment_intents WHERE order_id = $1"
    ))
    .bind(order_id)
    .fetch_optional(&self.pool)
    .await?;
    row.map(PaymentIntent::try_from).transpose()
  }

  async fn settle_intent(&self, order_id: Uuid) -> StoreResult<bool> {
    let result = sqlx::query(&format!(
      "UPDATE payment_intents SET status = '{}' WHERE order_id = $1 AND status = '{}'",
      IntentStatus::Paid.as_str(),
      IntentStatus::Created.as_str()
    ))
    .bind(order_id)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }
}
