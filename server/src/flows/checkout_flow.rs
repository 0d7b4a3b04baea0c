// kart_server/src/flows/checkout_flow.rs

//! Cart → pending order. Stock, coupon hold and gateway order are taken
//! before anything is persisted; any failure gives them back in reverse.

use kartflow::{ContextData, Flow, FlowControl, Flows, SkipCondition};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::flows::contexts::CheckoutCtxData;
use crate::models::{IntentStatus, Order, OrderItem, OrderStatus, PaymentIntent, PaymentIntentView, PaymentMethod};
use crate::services::gateway::call_with_timeout;
use crate::services::orders::AddressChoice;
use crate::services::{addresses, coupons, stock};
use crate::state::AppState;

pub const FLOW_NAME: &str = "checkout";

pub fn register_checkout_flow(flows: &Arc<Flows<AppError>>, _app_state: &AppState) {
  let no_coupon: SkipCondition<CheckoutCtxData> =
    Arc::new(|ctx: ContextData<CheckoutCtxData>| ctx.read().request.coupon_code.is_none());
  let not_online: SkipCondition<CheckoutCtxData> =
    Arc::new(|ctx: ContextData<CheckoutCtxData>| ctx.read().request.payment_method != PaymentMethod::Online);

  let mut f = Flow::<CheckoutCtxData, AppError>::new(
    FLOW_NAME,
    &[
      ("resolve_shipping_address", false, None),
      ("load_cart", false, None),
      ("reserve_stock", false, None),
      ("hold_coupon", false, Some(no_coupon)),
      ("open_gateway_order", false, Some(not_online)),
      ("persist_order", false, None),
      ("clear_cart", true, None),
    ],
  );

  f.on_root("resolve_shipping_address", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, choice) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.user_id, guard.request.address.clone())
      };

      let shipping = match choice {
        AddressChoice::Saved(address_id) => addresses::get(&app_state, user_id, address_id).await?.to_shipping(),
        AddressChoice::Inline(draft) => {
          draft.validate()?;
          draft.to_shipping()
        }
        AddressChoice::Default => app_state
          .stores
          .addresses
          .default_for(user_id)
          .await?
          .ok_or_else(|| AppError::Validation("No shipping address given and no default address saved".to_string()))?
          .to_shipping(),
      };
      ctx_data.write().shipping = Some(shipping);
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  f.on_root("load_cart", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, user_id) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.user_id)
      };
      let mut lines = app_state.stores.carts.lines(user_id).await?;
      if lines.is_empty() {
        return Err(AppError::EmptyCart);
      }
      // A fixed order keeps concurrent checkouts from reserving crosswise.
      lines.sort_by_key(|line| line.product_id);
      ctx_data.write().cart_lines = lines;
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  f.on_root("reserve_stock", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, lines) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.cart_lines.clone())
      };
      for line in lines {
        let product = match stock::reserve(&app_state, line.product_id, line.quantity).await {
          Ok(product) => product,
          Err(AppError::NotFound(_)) => {
            return Err(AppError::InsufficientStock {
              product_id: line.product_id,
            })
          }
          Err(e) => return Err(e),
        };
        ctx_data.write().reserved.push(OrderItem {
          product_id: product.id,
          product_name: product.name,
          quantity: line.quantity,
          price_at_order_minor: product.price_minor,
          product_image_url: product.image_url,
        });
      }
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  f.compensate_root("reserve_stock", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, order_id, reserved) = {
        let mut guard = ctx_data.write();
        (guard.app_state.clone(), guard.order_id, std::mem::take(&mut guard.reserved))
      };
      for item in reserved.iter().rev() {
        if let Err(e) = stock::release(&app_state, item.product_id, item.quantity).await {
          error!(%order_id, product_id = %item.product_id, quantity = item.quantity, error = %e,
            "Failed to release reserved stock during checkout rollback.");
        }
      }
      info!(%order_id, released_lines = reserved.len(), "Checkout reservations released.");
      Ok::<_, AppError>(())
    })
  });

  f.on_root("hold_coupon", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id, code) = {
        let guard = ctx_data.read();
        (
          guard.app_state.clone(),
          guard.user_id,
          guard.order_id,
          guard.request.coupon_code.clone().unwrap_or_default(),
        )
      };
      let (coupon, inserted) = coupons::prepare_redemption(&app_state, user_id, &code).await?;
      if inserted {
        ctx_data.write().inserted_redemption = Some(coupon.code.clone());
      }
      coupons::hold_for_order(&app_state, user_id, &coupon.code, order_id).await?;
      ctx_data.write().held_coupon = Some(coupon);
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  // Drops the hold, then the redemption row too if this checkout created it.
  f.compensate_root("hold_coupon", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id, held, inserted) = {
        let mut guard = ctx_data.write();
        (
          guard.app_state.clone(),
          guard.user_id,
          guard.order_id,
          guard.held_coupon.take(),
          guard.inserted_redemption.take(),
        )
      };
      if let Some(coupon) = held {
        if let Err(e) = coupons::release_hold(&app_state, user_id, &coupon.code, order_id).await {
          error!(%order_id, code = %coupon.code, error = %e, "Failed to release coupon hold during checkout rollback.");
        }
      }
      if let Some(code) = inserted {
        match coupons::discard_redemption(&app_state, user_id, &code).await {
          Ok(true) => info!(%order_id, %code, "Coupon redemption created by this checkout discarded."),
          Ok(false) => warn!(%order_id, %code, "Coupon redemption is in use elsewhere; left in place."),
          Err(e) => error!(%order_id, %code, error = %e, "Failed to discard coupon redemption during checkout rollback."),
        }
      }
      Ok::<_, AppError>(())
    })
  });

  f.on_root("open_gateway_order", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, order_id, amount_due) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.order_id, guard.amount_due_minor())
      };
      let amount = amount_due.max(app_state.config.min_payment_amount_minor);
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

  f.on_root("persist_order", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, order, intent) = {
        let guard = ctx_data.read();
        let app_state = guard.app_state.clone();
        let cfg = &app_state.config;
        let shipping = guard
          .shipping
          .clone()
          .ok_or_else(|| AppError::Internal("shipping address missing at persist".to_string()))?;

        // Only cash on delivery keeps its stock until someone cancels it.
        let reservation_expires_at = match guard.request.payment_method {
          PaymentMethod::Online | PaymentMethod::Wallet => Some(cfg.reservation_deadline(guard.now)?),
          PaymentMethod::Cod => None,
        };

        let intent = guard.gateway_order.as_ref().map(|g| PaymentIntent {
          order_id: guard.order_id,
          external_ref: Some(g.id.clone()),
          amount_minor: g.amount_minor,
          currency: g.currency.clone(),
          status: IntentStatus::Created,
          created_at: guard.now,
        });

        let order = Order {
          id: guard.order_id,
          user_id: guard.user_id,
          status: OrderStatus::Pending,
          payment_method: guard.request.payment_method,
          items: guard.reserved.clone(),
          shipping_address: shipping,
          total_minor: guard.items_total_minor(),
          discount_minor: guard.discount_minor(),
          amount_due_minor: guard.amount_due_minor(),
          currency: cfg.currency.clone(),
          coupon_code: guard.held_coupon.as_ref().map(|c| c.code.clone()),
          external_payment_ref: guard.gateway_order.as_ref().map(|g| g.id.clone()),
          payment_id: None,
          reservation_expires_at,
          stock_reserved: true,
          created_at: guard.now,
          updated_at: guard.now,
        };
        (app_state.clone(), order, intent)
      };

      app_state.stores.orders.insert(&order, intent.as_ref()).await?;
      info!(
        order_id = %order.id,
        total_minor = order.total_minor,
        amount_due_minor = order.amount_due_minor,
        payment_method = order.payment_method.as_str(),
        "Order persisted as pending."
      );

      let payment = intent.map(|i| PaymentIntentView {
        order_id: order.id,
        external_order_id: i.external_ref.unwrap_or_default(),
        amount_minor: i.amount_minor,
        currency: i.currency,
        gateway_key_id: app_state.gateway.key_id().to_string(),
      });
      {
        let mut guard = ctx_data.write();
        guard.order = Some(order);
        guard.payment = payment;
      }
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  // The order is committed at this point; a stale cart is only cosmetic.
  f.on_root("clear_cart", |ctx_data: ContextData<CheckoutCtxData>| {
    Box::pin(async move {
      let (app_state, user_id, order_id) = {
        let guard = ctx_data.read();
        (guard.app_state.clone(), guard.user_id, guard.order_id)
      };
      if let Err(e) = app_state.stores.carts.clear(user_id).await {
        warn!(%order_id, error = %e, "Could not clear cart after checkout.");
      }
      Ok::<_, AppError>(FlowControl::Continue)
    })
  });

  flows.register(f);
}
