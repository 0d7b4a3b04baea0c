// kart_server/src/flows/confirm_flow.rs

//! pending → paid and everything that must happen exactly once with it.
//!
//! Only the caller whose `mark_paid` flips the order continues past that step.
//! A failure anywhere after the flip undoes the side effects in reverse and
//! moves the order back to pending, so a confirmation is either fully applied
//! or not at all.

use kartflow::{ContextData, Flow, FlowControl, Flows, SkipCondition};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::flows::contexts::ConfirmCtxData;
use crate::services::{coupons, wallet};
use crate::state::AppState;

pub const FLOW_NAME: &str = "confirm_payment";

pub fn register_confirm_flow(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let not_wallet: SkipCondition<ConfirmCtxData> =
    Arc::new(|ctx: ContextData<ConfirmCtxData>| ctx.read().wallet_debit_minor.is_none());
  let no_coupon: SkipCondition<ConfirmCtxData> =
    Arc::new(|ctx: ContextData<ConfirmCtxData>| ctx.read().coupon_code.is_none());

  let mut f = Flow::<ConfirmCtxData, AppError>::new(
    FLOW_NAME,
    &[
      ("debit_wallet", false, Some(not_wallet)),
      ("mark_paid", false, None),
      ("accrue_cashback", false, None),
      ("consume_coupon", false, Some(no_coupon)),
      ("settle_intent", false, None),
    ],
  );

  f.on_root("debit_wallet", |ctx_data: ContextData<ConfirmCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id, amount) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard.user_id,
          guard.order_id,
          guard.wallet_debit_minor.unwrap_or(0),
        )
      };
      if amount > 0 {
        let account = wallet::debit(&app_state, user_id, amount).await?;
        info!(%order_id, amount, balance_minor = account.balance_minor, "Wallet debited for order.");
        ctx_data.write().wallet_debited = true;
      }
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  f.compensate_root("debit_wallet", |ctx_data: ContextData<ConfirmCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id, amount, debited) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard.user_id,
          guard.order_id,
          guard.wallet_debit_minor.unwrap_or(0),
          guard.wallet_debited,
        )
      };
      if debited {
        match wallet::credit(&app_state, user_id, amount).await {
          Ok(_) => {
            info!(%order_id, amount, "Wallet debit refunded.");
            ctx_data.write().wallet_debited = false;
          }
          Err(e) => {
            error!(%order_id, amount, error = %e, "Failed to refund wallet debit.");
            return Err(e);
          }
        }
      }
      Ok::<_, AppError>(())
    })
  });

  f.on_root("mark_paid", |ctx_data: ContextData<ConfirmCtxData>| {
    Box::pin(async move {
      let (app_state, order_id, payment_id, now) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.order_id, guard.payment_id.clone(), guard.now)
      };
      match app_state
        .stores
        .orders
        .mark_paid(order_id, payment_id.as_deref(), now)
        .await?
      {
        Some(order) => {
          info!(%order_id, "Order marked paid.");
          ctx_data.write().paid_order = Some(order);
          Ok::<_, AppError>(FlowControl::Continue)
        }
        None => {
          debug!(%order_id, "Order was no longer pending and unexpired at mark_paid.");
          ctx_data.write().lost_race = true;
          Err(AppError::OrderNotPending {
            order_id,
            status: "changed concurrently".to_string(),
          })
        }
      }
    })
  });

  f.compensate_root("mark_paid", |ctx_data: ContextData<ConfirmCtxData>| {
    Box::pin(async move {
      let (app_state, order_id, flipped) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.order_id, guard.paid_order.is_some())
      };
      if flipped {
        let now = app_state.clock.now();
        match app_state.stores.orders.revert_paid(order_id, now).await {
          Ok(true) => {
            warn!(%order_id, "Paid transition rolled back to pending.");
            ctx_data.write().paid_order = None;
          }
          Ok(false) => warn!(%order_id, "Order was not paid when rolling back."),
          Err(e) => {
            error!(%order_id, error = %e, "Failed to roll back paid transition.");
            return Err(AppError::from(e));
          }
        }
      }
      Ok::<_, AppError>(())
    })
  });

  f.on_root("accrue_cashback", |ctx_data: ContextData<ConfirmCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.user_id, guard.order_id)
      };
      let credited = wallet::accrue_cashback(&app_state, user_id, order_id).await?;
      ctx_data.write().cashback_minor = credited;
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  f.compensate_root("accrue_cashback", |ctx_data: ContextData<ConfirmCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id, credited) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.user_id, guard.order_id, guard.cashback_minor)
      };
      if credited > 0 {
        match wallet::reverse_accrual(&app_state, user_id, credited).await {
          Ok(_) => ctx_data.write().cashback_minor = 0,
          Err(e) => {
            error!(%order_id, amount = credited, error = %e, "Failed to reverse cashback accrual.");
            return Err(e);
          }
        }
      }
      Ok::<_, AppError>(())
    })
  });

  f.on_root("consume_coupon", |ctx_data: ContextData<ConfirmCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id, code) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard.user_id,
          guard.order_id,
          guard.coupon_code.clone().unwrap_or_default(),
        )
      };
      if coupons::consume(&app_state, user_id, &code, order_id).await? {
        ctx_data.write().coupon_consumed = true;
      } else {
        warn!(%order_id, %code, "No coupon hold found for paid order.");
      }
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  f.compensate_root("consume_coupon", |ctx_data: ContextData<ConfirmCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id, code, consumed) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard.user_id,
          guard.order_id,
          guard.coupon_code.clone().unwrap_or_default(),
          guard.coupon_consumed,
        )
      };
      if consumed {
        match coupons::unconsume(&app_state, user_id, &code, order_id).await {
          Ok(_) => ctx_data.write().coupon_consumed = false,
          Err(e) => {
            error!(%order_id, %code, error = %e, "Failed to un-consume coupon.");
            return Err(e);
          }
        }
      }
      Ok::<_, AppError>(())
    })
  });

  // COD and wallet orders have no intent row; nothing to settle for them.
  f.on_root("settle_intent", |ctx_data: ContextData<ConfirmCtxData>| {
    Box::pin(async move {
      let (app_state, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.order_id)
      };
      let settled = app_state.stores.orders.settle_intent(order_id).await?;
      ctx_data.write().intent_settled = settled;
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  flows.register(f);
}
