// kart_server/src/web/handlers/wallet_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use super::order_handlers::OrderResponse;
use crate::errors::AppError;
use crate::services::{payments, wallet};
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct WalletPayPayload {
  pub order_id: Uuid,
}

#[instrument(name = "handler::get_wallet", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn get_wallet_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let account = wallet::account(&app_state, auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(account))
}

#[instrument(name = "handler::redeem_cashback", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn redeem_cashback_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let redemption = wallet::redeem_cashback(&app_state, auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(redemption))
}

#[instrument(name = "handler::wallet_pay", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id, order_id = %payload.order_id))]
pub async fn wallet_pay_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<WalletPayPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let order = payments::pay_with_wallet(&app_state, auth_user.user_id, payload.order_id).await?;
  Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
