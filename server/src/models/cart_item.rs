// kart_server/src/models/cart_item.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Advisory cart line. Unique per `(user_id, product_id)`; quantity is
/// re-checked against live stock at checkout.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CartItem {
  pub id: Uuid,
  pub user_id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub added_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the live product record.
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
  pub id: Uuid,
  pub product_id: Uuid,
  pub quantity: i32,
  pub product_name: String,
  pub unit_price_minor: i64,
  pub line_total_minor: i64,
  pub stock: i32,
  pub available: bool,
  pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
  pub items: Vec<CartLineView>,
  pub total_minor: i64,
  pub item_count: i32,
}
