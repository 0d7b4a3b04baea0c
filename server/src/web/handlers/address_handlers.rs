// kart_server/src/web/handlers/address_handlers.rs

use actix_web::{web, HttpResponse};
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{AddressDraft, AddressPatch};
use crate::services::addresses;
use crate::state::AppState;
use crate::web::extractors::AuthenticatedUser;

#[instrument(name = "handler::list_addresses", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn list_addresses_handler(
  app_state: web::Data<AppState>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let list = addresses::list(&app_state, auth_user.user_id).await?;
  Ok(HttpResponse::Ok().json(list))
}

#[instrument(name = "handler::create_address", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn create_address_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<AddressDraft>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let address = addresses::create(&app_state, auth_user.user_id, payload.into_inner()).await?;
  Ok(HttpResponse::Created().json(address))
}

#[instrument(name = "handler::update_address", skip(app_state, payload, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn update_address_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<AddressPatch>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let address = addresses::update(&app_state, auth_user.user_id, path.into_inner(), payload.into_inner()).await?;
  Ok(HttpResponse::Ok().json(address))
}

#[instrument(name = "handler::set_default_address", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn set_default_address_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  let address = addresses::set_default(&app_state, auth_user.user_id, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(address))
}

#[instrument(name = "handler::delete_address", skip(app_state, auth_user), fields(user_id = %auth_user.user_id))]
pub async fn delete_address_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  auth_user: AuthenticatedUser,
) -> Result<HttpResponse, AppError> {
  addresses::delete(&app_state, auth_user.user_id, path.into_inner()).await?;
  Ok(HttpResponse::NoContent().finish())
}
