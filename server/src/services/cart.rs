// kart_server/src/services/cart.rs

use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{CartItem, CartLineView, CartView};
use crate::state::AppState;

/// Adds `qty` of a product, storing `min(existing + qty, live stock)`.
#[instrument(name = "cart::add", skip(state))]
pub async fn add(state: &AppState, user_id: Uuid, product_id: Uuid, qty: i32) -> Result<CartItem> {
  if qty <= 0 {
    return Err(AppError::Validation("Quantity must be positive".to_string()));
  }
  let product = state
    .stores
    .catalog
    .product(product_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Product {}", product_id)))?;
  if product.stock <= 0 {
    return Err(AppError::InsufficientStock { product_id });
  }

  let item = state
    .stores
    .carts
    .upsert_clamped(user_id, product_id, qty, product.stock, state.clock.now())
    .await?;
  info!(%product_id, stored_quantity = item.quantity, "Cart line upserted.");
  Ok(item)
}

/// Cart lines joined with live product data, newest first.
#[instrument(name = "cart::view", skip(state))]
pub async fn view(state: &AppState, user_id: Uuid) -> Result<CartView> {
  let lines = state.stores.carts.lines(user_id).await?;
  let mut items = Vec::with_capacity(lines.len());
  for line in lines {
    let view = match state.stores.catalog.product(line.product_id).await? {
      Some(product) => CartLineView {
        id: line.id,
        product_id: line.product_id,
        quantity: line.quantity,
        line_total_minor: i64::from(line.quantity) * product.price_minor,
        unit_price_minor: product.price_minor,
        available: product.stock >= line.quantity,
        stock: product.stock,
        product_name: product.name,
        image_url: product.image_url,
      },
      None => CartLineView {
        id: line.id,
        product_id: line.product_id,
        quantity: line.quantity,
        product_name: "Unavailable product".to_string(),
        unit_price_minor: 0,
        line_total_minor: 0,
        stock: 0,
        available: false,
        image_url: None,
      },
    };
    items.push(view);
  }

  let total_minor = items.iter().filter(|i| i.available).map(|i| i.line_total_minor).sum();
  let item_count = items.iter().map(|i| i.quantity).sum();
  Ok(CartView {
    items,
    total_minor,
    item_count,
  })
}

/// `qty == 0` removes the line; anything above live stock is clamped.
/// Returns `None` when the line was removed.
#[instrument(name = "cart::set_quantity", skip(state))]
pub async fn set_quantity(state: &AppState, user_id: Uuid, item_id: Uuid, qty: i32) -> Result<Option<CartItem>> {
  if qty < 0 {
    return Err(AppError::Validation("Quantity must not be negative".to_string()));
  }
  let line = state
    .stores
    .carts
    .line(user_id, item_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Cart item {}", item_id)))?;

  if qty == 0 {
    state.stores.carts.remove(user_id, item_id).await?;
    return Ok(None);
  }

  let stock = state
    .stores
    .catalog
    .product(line.product_id)
    .await?
    .map(|p| p.stock)
    .unwrap_or(0);
  if stock <= 0 {
    return Err(AppError::InsufficientStock {
      product_id: line.product_id,
    });
  }

  let updated = state
    .stores
    .carts
    .set_quantity(user_id, item_id, qty.min(stock), state.clock.now())
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Cart item {}", item_id)))?;
  Ok(Some(updated))
}

#[instrument(name = "cart::remove", skip(state))]
pub async fn remove(state: &AppState, user_id: Uuid, item_id: Uuid) -> Result<bool> {
  Ok(state.stores.carts.remove(user_id, item_id).await?)
}

#[instrument(name = "cart::clear", skip(state))]
pub async fn clear(state: &AppState, user_id: Uuid) -> Result<u64> {
  Ok(state.stores.carts.clear(user_id).await?)
}
