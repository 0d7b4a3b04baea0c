// kart_server/src/services/orders.rs

//! Order assembly, reads, cancellation and reservation release.

use kartflow::{ContextData, FlowResult};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::flows::contexts::CheckoutCtxData;
use crate::models::{AddressDraft, Order, OrderStatus, PaymentIntentView, PaymentMethod};
use crate::services::{coupons, stock};
use crate::state::AppState;

/// Where the order ships to.
#[derive(Debug, Clone)]
pub enum AddressChoice {
  /// The user's current default address.
  Default,
  Saved(Uuid),
  Inline(AddressDraft),
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
  pub address: AddressChoice,
  pub coupon_code: Option<String>,
  pub payment_method: PaymentMethod,
}

#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
  pub order: Order,
  /// Present for online orders.
  pub payment: Option<PaymentIntentView>,
}

/// Turns the user's cart into a pending order, all-or-nothing.
#[instrument(name = "orders::checkout", skip(state, request), fields(payment_method = request.payment_method.as_str()))]
pub async fn checkout(state: &AppState, user_id: Uuid, request: CheckoutRequest) -> Result<CheckoutOutcome> {
  let ctx_data = ContextData::new(CheckoutCtxData::new(state.clone(), user_id, request));

  match state.flows.run(ctx_data.clone()).await? {
    FlowResult::Completed => {
      let (order, payment) = {
        let mut guard = ctx_data.write();
        (guard.order.take(), guard.payment.take())
      };
      let order = order.ok_or_else(|| AppError::Internal("checkout completed without an order".to_string()))?;
      info!(order_id = %order.id, "Checkout completed.");
      Ok(CheckoutOutcome { order, payment })
    }
    FlowResult::Stopped => Err(AppError::Internal("checkout flow stopped unexpectedly".to_string())),
  }
}

#[instrument(name = "orders::list", skip(state))]
pub async fn list(state: &AppState, user_id: Uuid) -> Result<Vec<Order>> {
  Ok(state.stores.orders.list_for_user(user_id).await?)
}

/// Another user's order is reported as not found.
#[instrument(name = "orders::get", skip(state))]
pub async fn get(state: &AppState, user_id: Uuid, order_id: Uuid) -> Result<Order> {
  match state.stores.orders.get(order_id).await? {
    Some(order) if order.user_id == user_id => Ok(order),
    _ => Err(AppError::NotFound(format!("Order {}", order_id))),
  }
}

/// pending → cancelled, then gives the stock back.
#[instrument(name = "orders::cancel", skip(state))]
pub async fn cancel(state: &AppState, user_id: Uuid, order_id: Uuid) -> Result<Order> {
  let current = get(state, user_id, order_id).await?;
  let Some(cancelled) = state.stores.orders.cancel(order_id, state.clock.now()).await? else {
    let status = state
      .stores
      .orders
      .get(order_id)
      .await?
      .map_or(current.status, |o| o.status);
    return Err(AppError::OrderNotPending {
      order_id,
      status: status.to_string(),
    });
  };
  info!(%order_id, "Order cancelled by user.");
  if let Err(e) = release_reservation(state, &cancelled).await {
    warn!(%order_id, error = %e, "Reservation release incomplete; the reaper will retry unclaimed stock.");
  }
  get(state, user_id, order_id).await
}

/// Cancels a pending order whose reservation deadline has passed and releases
/// its stock. False when the order was not (or no longer) expirable.
#[instrument(name = "orders::expire", skip(state))]
pub async fn expire(state: &AppState, order_id: Uuid) -> Result<bool> {
  let Some(expired) = state.stores.orders.expire(order_id, state.clock.now()).await? else {
    return Ok(false);
  };
  info!(%order_id, "Order expired; releasing reservation.");
  if let Err(e) = release_reservation(state, &expired).await {
    warn!(%order_id, error = %e, "Reservation release incomplete; the reaper will retry unclaimed stock.");
  }
  Ok(true)
}

/// Returns a cancelled order's stock and coupon hold. Whoever flips
/// `stock_reserved` does the release; everyone else gets `false`.
#[instrument(name = "orders::release_reservation", skip(state, order), fields(order_id = %order.id))]
pub async fn release_reservation(state: &AppState, order: &Order) -> Result<bool> {
  if order.status != OrderStatus::Cancelled {
    return Ok(false);
  }
  if !state
    .stores
    .orders
    .claim_stock_release(order.id, state.clock.now())
    .await?
  {
    return Ok(false);
  }

  let mut failures = 0usize;
  for item in order.items.iter().rev() {
    if let Err(e) = stock::release(state, item.product_id, item.quantity).await {
      failures += 1;
      error!(order_id = %order.id, product_id = %item.product_id, quantity = item.quantity, error = %e,
        "Stock release failed after claim; manual reconciliation needed.");
    }
  }

  if let Some(code) = &order.coupon_code {
    match coupons::release_hold(state, order.user_id, code, order.id).await {
      Ok(true) => info!(order_id = %order.id, %code, "Coupon hold released."),
      Ok(false) => warn!(order_id = %order.id, %code, "No coupon hold to release."),
      Err(e) => error!(order_id = %order.id, %code, error = %e, "Coupon hold release failed."),
    }
  }

  if failures > 0 {
    return Err(AppError::Internal(format!(
      "{} of {} stock releases failed for order {}",
      failures,
      order.items.len(),
      order.id
    )));
  }
  Ok(true)
}
