// kart_server/src/flows/intent_flow.rs

//! Opens a gateway payment for an existing pending order that has none yet.
//! The intent row is claimed first so that concurrent requests cannot open
//! two gateway orders for one order.

use kartflow::{ContextData, Flow, FlowControl, Flows};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::flows::contexts::IntentCtxData;
use crate::models::{IntentStatus, OrderStatus, PaymentIntent, PaymentIntentView};
use crate::services::gateway::call_with_timeout;
use crate::services::orders;
use crate::state::AppState;

pub const FLOW_NAME: &str = "create_payment_intent";

pub fn register_intent_flow(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let mut f = Flow::<IntentCtxData, AppError>::new(
    FLOW_NAME,
    &[
      ("load_order", false, None),
      ("claim_intent", false, None),
      ("request_gateway_order", false, None),
      ("attach_intent", false, None),
    ],
  );

  f.on_root("load_order", |ctx_data: ContextData<IntentCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id, now) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.user_id, guard.order_id, guard.now)
      };
      let order = orders::get(&app_state, user_id, order_id).await?;
      if order.status != OrderStatus::Pending {
        return Err(AppError::OrderNotPending {
          order_id,
          status: order.status.to_string(),
        });
      }
      if order.is_expired_at(now) {
        orders::expire(&app_state, order_id).await?;
        return Err(AppError::OrderExpired(order_id));
      }

      let amount = order.amount_due_minor.max(app_state.config.min_payment_amount_minor);
      {
        let mut guard = ctx_data.write();
        guard.amount_minor = amount;
        guard.order = Some(order);
      }
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  f.on_root("claim_intent", |ctx_data: ContextData<IntentCtxData>| {
    Box::pin(async move {
      let (app_state, intent) = {
        let guard = ctx_data.read();
        let intent = PaymentIntent {
          order_id: guard.order_id,
          external_ref: None,
          amount_minor: guard.amount_minor,
          currency: guard.app_state.config.currency.clone(),
          status: IntentStatus::Creating,
          created_at: guard.now,
        };
        (guard.app_state.clone(), intent)
      };
      if !app_state.stores.orders.claim_intent(&intent).await? {
        warn!(order_id = %intent.order_id, "Payment intent already exists.");
        return Err(AppError::IntentAlreadyExists(intent.order_id));
      }
      ctx_data.write().intent_claimed = true;
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  f.compensate_root("claim_intent", |ctx_data: ContextData<IntentCtxData>| {
    Box::pin(async move {
      let (app_state, order_id, claimed) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.order_id, guard.intent_claimed)
      };
      if claimed {
        match app_state.stores.orders.drop_intent_claim(order_id).await {
          Ok(_) => ctx_data.write().intent_claimed = false,
          Err(e) => error!(%order_id, error = %e, "Failed to drop payment intent claim."),
        }
      }
      Ok::<_, AppError>(())
    })
  });

  f.on_root("request_gateway_order", |ctx_data: ContextData<IntentCtxData>| {
    Box::pin(async move {
      let (app_state, order_id, amount) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.order_id, guard.amount_minor)
      };
      let receipt = format!("order_{}", order_id.simple());
      let gateway_order = call_with_timeout(
        app_state.config.gateway_timeout,
        app_state
          .gateway
          .create_order(amount, &app_state.config.currency, &receipt),
      )
      .await?;
      info!(%order_id, external_order_id = %gateway_order.id, amount, "Gateway order opened.");
      ctx_data.write().gateway_order = Some(gateway_order);
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  f.on_root("attach_intent", |ctx_data: ContextData<IntentCtxData>| {
    Box::pin(async move {
      let (app_state, order_id, now, gateway_order) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.order_id, guard.now, guard.gateway_order.clone())
      };
      let gateway_order =
        gateway_order.ok_or_else(|| AppError::Internal("gateway order missing at attach".to_string()))?;
      let expires_at = app_state.config.reservation_deadline(now)?;

      if !app_state
        .stores
        .orders
        .attach_intent(order_id, &gateway_order.id, expires_at, now)
        .await?
      {
        // The order left pending while the gateway call was in flight.
        let status = app_state
          .stores
          .orders
          .get(order_id)
          .await?
          .map_or_else(|| "missing".to_string(), |o| o.status.to_string());
        return Err(AppError::OrderNotPending { order_id, status });
      }

      let view = PaymentIntentView {
        order_id,
        external_order_id: gateway_order.id.clone(),
        amount_minor: gateway_order.amount_minor,
        currency: gateway_order.currency.clone(),
        gateway_key_id: app_state.gateway.key_id().to_string(),
      };
      ctx_data.write().view = Some(view);
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  flows.register(f);
}
