// kart_server/src/web/handlers/cart_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::services::cart;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct AddToCartPayload {
  pub product_id: Uuid,
  #[serde(default = "one")]
  pub quantity: i32,
}

fn one() -> i32 {
  1
}

#[derive(Deserialize, Debug)]
pub struct SetQuantityPayload {
  pub quantity: i32,
}

#[instrument(name = "handler::view_cart", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn view_cart_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let view = cart::view(&app_state, auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(view))
}

#[instrument(
  name = "handler::add_to_cart",
  skip(app_state, payload, auth_user),
  fields(user_id = %auth_user.user_id, product_id = %payload.product_id, quantity = payload.quantity)
)]
pub async fn add_to_cart_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<AddToCartPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let item = cart::add(&app_state, auth_user.user_id, payload.product_id, payload.quantity).await?;
  Ok(HttpResponse::Ok().json(item))
}

#[instrument(name = "handler::set_cart_quantity", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn set_quantity_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<SetQuantityPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let item_id = path.into_inner();
  match cart::set_quantity(&app_state, auth_user.user_id, item_id, payload.quantity).await? {
    Some(item) => Ok(HttpResponse::Ok().json(item)),
    None => Ok(HttpResponse::Ok().json(json!({ "id": item_id, "removed": true }))),
  }
}

#[instrument(name = "handler::remove_cart_item", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn remove_item_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let item_id = path.into_inner();
  if !cart::remove(&app_state, auth_user.user_id, item_id).await? {
    return Err(AppError::NotFound(format!("Cart item {}", item_id)));
  }
  Ok(HttpResponse::NoContent().finish())
}
