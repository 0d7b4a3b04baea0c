// kart_server/src/services/stock.rs

//! The only code path that changes product stock.

use tracing::{instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{Product, Reservation};
use crate::state::AppState;

/// Decrements stock by `qty` if at least that much is available and returns
/// the product as it stood right after the write.
#[instrument(name = "stock::reserve", skip(state))]
pub async fn reserve(state: &AppState, product_id: Uuid, qty: i32) -> Result<Product> {
  if qty <= 0 {
    return Err(AppError::Validation("Quantity must be positive".to_string()));
  }
  match state.stores.catalog.reserve(product_id, qty).await? {
    Reservation::Reserved(product) => Ok(product),
    Reservation::Insufficient { available } => {
      warn!(%product_id, requested = qty, available, "Reservation refused.");
      Err(AppError::InsufficientStock { product_id })
    }
    Reservation::UnknownProduct => Err(AppError::NotFound(format!("Product {}", product_id))),
  }
}

/// Puts `qty` back. Returns false when the product has since disappeared.
#[instrument(name = "stock::release", skip(state))]
pub async fn release(state: &AppState, product_id: Uuid, qty: i32) -> Result<bool> {
  if qty <= 0 {
    return Err(AppError::Validation("Quantity must be positive".to_string()));
  }
  let released = state.stores.catalog.release(product_id, qty).await?;
  if !released {
    warn!(%product_id, qty, "Released stock for a product that no longer exists.");
  }
  Ok(released)
}
