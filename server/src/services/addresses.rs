// kart_server/src/services/addresses.rs

use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{Address, AddressDraft, AddressPatch, DefaultPolicy};
use crate::state::AppState;

fn not_found(address_id: Uuid) -> AppError {
  AppError::NotFound(format!("Address {}", address_id))
}

#[instrument(name = "addresses::list", skip(state))]
pub async fn list(state: &AppState, user_id: Uuid) -> Result<Vec<Address>> {
  Ok(state.stores.addresses.list(user_id).await?)
}

#[instrument(name = "addresses::get", skip(state))]
pub async fn get(state: &AppState, user_id: Uuid, address_id: Uuid) -> Result<Address> {
  state
    .stores
    .addresses
    .get(user_id, address_id)
    .await?
    .ok_or_else(|| not_found(address_id))
}

/// The first address is always the default; later ones only when asked.
#[instrument(name = "addresses::create", skip(state, draft))]
pub async fn create(state: &AppState, user_id: Uuid, draft: AddressDraft) -> Result<Address> {
  draft.validate()?;
  let policy = if draft.is_default {
    DefaultPolicy::Always
  } else {
    DefaultPolicy::IfFirst
  };
  let address = state
    .stores
    .addresses
    .create(user_id, &draft, policy, state.clock.now())
    .await?;
  info!(address_id = %address.id, is_default = address.is_default, "Address created.");
  Ok(address)
}

/// `is_default: Some(false)` is ignored; moving the default away is done by
/// making another address the default.
#[instrument(name = "addresses::update", skip(state, patch))]
pub async fn update(state: &AppState, user_id: Uuid, address_id: Uuid, patch: AddressPatch) -> Result<Address> {
  patch.validate()?;
  state
    .stores
    .addresses
    .update(user_id, address_id, &patch, state.clock.now())
    .await?
    .ok_or_else(|| not_found(address_id))
}

#[instrument(name = "addresses::set_default", skip(state))]
pub async fn set_default(state: &AppState, user_id: Uuid, address_id: Uuid) -> Result<Address> {
  state
    .stores
    .addresses
    .set_default(user_id, address_id, state.clock.now())
    .await?
    .ok_or_else(|| not_found(address_id))
}

#[instrument(name = "addresses::delete", skip(state))]
pub async fn delete(state: &AppState, user_id: Uuid, address_id: Uuid) -> Result<()> {
  if !state.stores.addresses.delete(user_id, address_id, state.clock.now()).await? {
    return Err(not_found(address_id));
  }
  info!(%address_id, "Address deleted.");
  Ok(())
}
