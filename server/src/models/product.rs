// kart_server/src/models/product.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub price_minor: i64,
  /// Never negative; only the stock primitive writes it.
  pub stock: i32,
  pub category_id: Option<Uuid>,
  pub image_url: Option<String>,
  pub updated_at: DateTime<Utc>,
}

/// Outcome of a conditional stock decrement.
#[derive(Debug, Clone)]
pub enum Reservation {
  /// Decrement applied; carries the product as it is right after the write.
  Reserved(Product),
  Insufficient { available: i32 },
  UnknownProduct,
}
