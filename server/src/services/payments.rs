// kart_server/src/services/payments.rs

//! Payment intents, gateway verification and wallet payment. All three end in
//! the confirm flow, which performs the single pending → paid transition.

use kartflow::{ContextData, FlowResult};
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::flows::contexts::{ConfirmCtxData, IntentCtxData};
use crate::models::{Order, OrderStatus, PaymentIntentView};
use crate::services::{orders, wallet};
use crate::state::AppState;

/// What the client got back from the gateway checkout.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfirmation {
  pub order_id: Uuid,
  #[serde(alias = "razorpay_order_id")]
  pub external_order_id: String,
  #[serde(alias = "razorpay_payment_id")]
  pub payment_id: String,
  #[serde(alias = "razorpay_signature")]
  pub signature: String,
}

/// Opens a gateway payment for a pending order that does not have one yet.
#[instrument(name = "payments::create_intent", skip(state))]
pub async fn create_intent(state: &AppState, user_id: Uuid, order_id: Uuid) -> Result<PaymentIntentView> {
  let ctx_data = ContextData::new(IntentCtxData::new(state.clone(), user_id, order_id));
  match state.flows.run(ctx_data.clone()).await? {
    FlowResult::Completed => ctx_data
      .write()
      .view
      .take()
      .ok_or_else(|| AppError::Internal("intent flow completed without a view".to_string())),
    FlowResult::Stopped => Err(AppError::Internal("intent flow stopped unexpectedly".to_string())),
  }
}

/// Checks the gateway signature and confirms the order. Calling it again for
/// an order that is already paid returns the order unchanged.
#[instrument(name = "payments::verify", skip(state, confirmation), fields(order_id = %confirmation.order_id))]
pub async fn verify(state: &AppState, user_id: Uuid, confirmation: PaymentConfirmation) -> Result<Order> {
  let order_id = confirmation.order_id;
  let order = orders::get(state, user_id, order_id).await?;
  if let Some(settled) = already_settled(&order)? {
    return Ok(settled);
  }

  let expected_ref = state
    .stores
    .orders
    .intent(order_id)
    .await?
    .and_then(|intent| intent.external_ref);
  if expected_ref.as_deref() != Some(confirmation.external_order_id.as_str()) {
    warn!(
      %order_id,
      %user_id,
      external_order_id = %confirmation.external_order_id,
      fraud_signal = true,
      "Payment reference does not match the order's intent."
    );
    return Err(AppError::InvalidSignature);
  }
  if !state.gateway.verify_signature(
    &confirmation.external_order_id,
    &confirmation.payment_id,
    &confirmation.signature,
  ) {
    warn!(
      %order_id,
      %user_id,
      payment_id = %confirmation.payment_id,
      fraud_signal = true,
      "Payment signature verification failed."
    );
    return Err(AppError::InvalidSignature);
  }

  expire_if_overdue(state, &order).await?;
  confirm(state, &order, Some(confirmation.payment_id), None).await
}

/// Pays a pending order from the wallet balance.
#[instrument(name = "payments::pay_with_wallet", skip(state))]
pub async fn pay_with_wallet(state: &AppState, user_id: Uuid, order_id: Uuid) -> Result<Order> {
  let order = orders::get(state, user_id, order_id).await?;
  if let Some(settled) = already_settled(&order)? {
    return Ok(settled);
  }
  expire_if_overdue(state, &order).await?;
  wallet::account(state, user_id).await?;
  let amount = order.amount_due_minor;
  confirm(state, &order, None, Some(amount)).await
}

/// `Some(order)` when the order is already paid, `OrderExpired` when it was
/// cancelled. Reads only.
fn already_settled(order: &Order) -> Result<Option<Order>> {
  if order.status.counts_as_paid() {
    info!(order_id = %order.id, "Order already paid; returning it unchanged.");
    return Ok(Some(order.clone()));
  }
  if order.status == OrderStatus::Cancelled {
    return Err(AppError::OrderExpired(order.id));
  }
  Ok(None)
}

/// Cancels a pending order whose deadline has passed and gives its stock back.
async fn expire_if_overdue(state: &AppState, order: &Order) -> Result<()> {
  if order.is_expired_at(state.clock.now()) {
    orders::expire(state, order.id).await?;
    return Err(AppError::OrderExpired(order.id));
  }
  Ok(())
}

async fn confirm(
  state: &AppState,
  order: &Order,
  payment_id: Option<String>,
  wallet_debit_minor: Option<i64>,
) -> Result<Order> {
  let ctx_data = ContextData::new(ConfirmCtxData::new(
    state.clone(),
    order,
    payment_id,
    wallet_debit_minor,
  ));

  match state.flows.run(ctx_data.clone()).await {
    Ok(FlowResult::Completed) => {
      let (paid, cashback_minor) = {
        let mut guard = ctx_data.write();
        (guard.paid_order.take(), guard.cashback_minor)
      };
      let paid = paid.ok_or_else(|| AppError::Internal("confirm flow completed without a paid order".to_string()))?;
      info!(order_id = %paid.id, cashback_minor, "Payment confirmed.");
      Ok(paid)
    }
    Ok(FlowResult::Stopped) => Err(AppError::Internal("confirm flow stopped unexpectedly".to_string())),
    Err(e) => {
      if !ctx_data.read().lost_race {
        return Err(e);
      }
      // Someone else moved the order first; report what they did.
      let current = state
        .stores
        .orders
        .get(order.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {}", order.id)))?;
      if current.status.counts_as_paid() {
        info!(order_id = %order.id, "Concurrent confirmation won; returning the paid order.");
        Ok(current)
      } else {
        if current.status == OrderStatus::Pending && current.is_expired_at(state.clock.now()) {
          orders::expire(state, order.id).await?;
        }
        Err(AppError::OrderExpired(order.id))
      }
    }
  }
}
