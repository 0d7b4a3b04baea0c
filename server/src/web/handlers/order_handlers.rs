// kart_server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{AddressDraft, Order, PaymentMethod};
use crate::services::orders::{self, AddressChoice, CheckoutRequest};
use crate::services::payments::{self, PaymentConfirmation};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

/// An order as clients see it: the record plus its coarse payment state.
#[derive(Serialize, Debug)]
pub struct OrderResponse {
  #[serde(flatten)]
  pub order: Order,
  pub payment_status: &'static str,
}

impl From<Order> for OrderResponse {
  fn from(order: Order) -> Self {
    let payment_status = order.status.payment_status();
    Self { order, payment_status }
  }
}

#[derive(Deserialize, Debug, Default)]
pub struct CheckoutPayload {
  pub address_id: Option<Uuid>,
  pub shipping_address: Option<AddressDraft>,
  pub coupon_code: Option<String>,
  pub payment_method: Option<PaymentMethod>,
}

impl CheckoutPayload {
  fn into_request(self, payment_method: PaymentMethod) -> Result<CheckoutRequest, AppError> {
    let address = match (self.address_id, self.shipping_address) {
      (Some(_), Some(_)) => {
        return Err(AppError::Validation(
          "Give either address_id or shipping_address, not both".to_string(),
        ))
      }
      (Some(id), None) => AddressChoice::Saved(id),
      (None, Some(draft)) => AddressChoice::Inline(draft),
      (None, None) => AddressChoice::Default,
    };
    let coupon_code = self.coupon_code.filter(|c| !c.trim().is_empty());
    Ok(CheckoutRequest {
      address,
      coupon_code,
      payment_method,
    })
  }
}

#[derive(Deserialize, Debug)]
pub struct CreatePaymentPayload {
  /// Set to open a payment for an existing order; otherwise the cart is checked out.
  pub order_id: Option<Uuid>,
  #[serde(flatten)]
  pub checkout: CheckoutPayload,
}

#[instrument(name = "handler::place_order", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn place_order_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CheckoutPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  let method = payload.payment_method.unwrap_or(PaymentMethod::Cod);
  if method == PaymentMethod::Online {
    return Err(AppError::Validation(
      "Online orders are placed through /orders/create-payment".to_string(),
    ));
  }
  let outcome = orders::checkout(&app_state, auth_user.user_id, payload.into_request(method)?).await?;
  info!(order_id = %outcome.order.id, "Order placed.");
  Ok(HttpResponse::Created().json(OrderResponse::from(outcome.order)))
}

#[instrument(name = "handler::create_payment", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn create_payment_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreatePaymentPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let payload = payload.into_inner();
  if let Some(order_id) = payload.order_id {
    let intent = payments::create_intent(&app_state, auth_user.user_id, order_id).await?;
    return Ok(HttpResponse::Ok().json(intent));
  }

  let request = payload.checkout.into_request(PaymentMethod::Online)?;
  let outcome = orders::checkout(&app_state, auth_user.user_id, request).await?;
  Ok(HttpResponse::Created().json(json!({
    "order": OrderResponse::from(outcome.order),
    "payment": outcome.payment,
  })))
}

#[instrument(name = "handler::verify_payment", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn verify_payment_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<PaymentConfirmation>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order = payments::verify(&app_state, auth_user.user_id, payload.into_inner()).await?;
  Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

#[instrument(name = "handler::list_orders", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let list: Vec<OrderResponse> = orders::list(&app_state, auth_user.user_id)
    .await?
    .into_iter()
    .map(OrderResponse::from)
    .collect();
  Ok(HttpResponse::Ok().json(list))
}

#[instrument(name = "handler::get_order", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order = orders::get(&app_state, auth_user.user_id, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

#[instrument(name = "handler::cancel_order", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn cancel_order_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order = orders::cancel(&app_state, auth_user.user_id, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
