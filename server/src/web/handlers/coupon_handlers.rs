// kart_server/src/web/handlers/coupon_handlers.rs

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::instrument;

use crate::errors::AppError;
use crate::services::coupons;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[derive(Deserialize, Debug)]
pub struct ApplyCouponPayload {
  pub code: String,
}

#[instrument(name = "handler::apply_coupon", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn apply_coupon_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<ApplyCouponPayload>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let applied = coupons::apply(&app_state, auth_user.user_id, &payload.code).await?;
  Ok(HttpResponse::Ok().json(applied))
}

#[instrument(name = "handler::list_coupons", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_coupons_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let listing = coupons::list(&app_state, auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(listing))
}
