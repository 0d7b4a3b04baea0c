// kart_server/src/db/memory/addresses.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

use super::Faults;
use crate::db::{AddressStore, StoreResult};
use crate::models::{Address, AddressDraft, AddressPatch, DefaultPolicy};

pub struct MemoryAddressStore {
  addresses: Mutex<Vec<Address>>,
  faults: Arc<Faults>,
}

impl MemoryAddressStore {
  pub fn new(faults: Arc<Faults>) -> Self {
    Self {
      addresses: Mutex::new(Vec::new()),
      faults,
    }
  }
}

fn newest_first(a: &Address, b: &Address) -> std::cmp::Ordering {
  b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

fn move_default(addresses: &mut [Address], user_id: Uuid, address_id: Uuid, now: DateTime<Utc>) {
  for address in addresses.iter_mut().filter(|a| a.user_id == user_id) {
    let should_be_default = address.id == address_id;
    if address.is_default != should_be_default {
      address.is_default = should_be_default;
      address.updated_at = now;
    }
  }
}

#[async_trait]
impl AddressStore for MemoryAddressStore {
  async fn list(&self, user_id: Uuid) -> StoreResult<Vec<Address>> {
    self.faults.check("addresses.list")?;
    let mut list: Vec<Address> = self
      .addresses
      .lock()
      .iter()
      .filter(|a| a.user_id == user_id)
      .cloned()
      .collect();
    list.sort_by(|a, b| b.is_default.cmp(&a.is_default).then_with(|| newest_first(a, b)));
    Ok(list)
  }

  async fn get(&self, user_id: Uuid, address_id: Uuid) -> StoreResult<Option<Address>> {
    self.faults.check("addresses.get")?;
    Ok(
      self
        .addresses
        .lock()
        .iter()
        .find(|a| a.user_id == user_id && a.id == address_id)
        .cloned(),
    )
  }

  async fn default_for(&self, user_id: Uuid) -> StoreResult<Option<Address>> {
    self.faults.check("addresses.default_for")?;
    Ok(
      self
        .addresses
        .lock()
        .iter()
        .find(|a| a.user_id == user_id && a.is_default)
        .cloned(),
    )
  }

  async fn create(
    &self,
    user_id: Uuid,
    draft: &AddressDraft,
    policy: DefaultPolicy,
    now: DateTime<Utc>,
  ) -> StoreResult<Address> {
    self.faults.check("addresses.create")?;
    let mut addresses = self.addresses.lock();
    let is_first = !addresses.iter().any(|a| a.user_id == user_id);
    let is_default = is_first || policy == DefaultPolicy::Always;

    let address = Address {
      id: Uuid::new_v4(),
      user_id,
      full_name: draft.full_name.clone(),
      phone: draft.phone.clone(),
      pincode: draft.pincode.clone(),
      address_line1: draft.address_line1.clone(),
      address_line2: draft.address_line2.clone(),
      landmark: draft.landmark.clone(),
      city: draft.city.clone(),
      state: draft.state.clone(),
      country: draft.country.clone(),
      address_type: draft.address_type.clone(),
      is_default: false,
      created_at: now,
      updated_at: now,
    };
    addresses.push(address.clone());
    if is_default {
      move_default(&mut addresses, user_id, address.id, now);
    }
    Ok(Address { is_default, ..address })
  }

  async fn update(
    &self,
    user_id: Uuid,
    address_id: Uuid,
    patch: &AddressPatch,
    now: DateTime<Utc>,
  ) -> StoreResult<Option<Address>> {
    self.faults.check("addresses.update")?;
    let mut addresses = self.addresses.lock();
    let Some(address) = addresses.iter_mut().find(|a| a.user_id == user_id && a.id == address_id) else {
      return Ok(None);
    };
    patch.apply_to(address);
    address.updated_at = now;
    if patch.is_default == Some(true) {
      move_default(&mut addresses, user_id, address_id, now);
    }
    Ok(addresses.iter().find(|a| a.id == address_id).cloned())
  }

  async fn set_default(&self, user_id: Uuid, address_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Address>> {
    self.faults.check("addresses.set_default")?;
    let mut addresses = self.addresses.lock();
    if !addresses.iter().any(|a| a.user_id == user_id && a.id == address_id) {
      return Ok(None);
    }
    move_default(&mut addresses, user_id, address_id, now);
    Ok(addresses.iter().find(|a| a.id == address_id).cloned())
  }

  async fn delete(&self, user_id: Uuid, address_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
    self.faults.check("addresses.delete")?;
    let mut addresses = self.addresses.lock();
    let Some(pos) = addresses.iter().position(|a| a.user_id == user_id && a.id == address_id) else {
      return Ok(false);
    };
    let removed = addresses.remove(pos);
    if removed.is_default {
      let successor = addresses
        .iter()
        .filter(|a| a.user_id == user_id)
        .min_by(|a, b| newest_first(a, b))
        .map(|a| a.id);
      if let Some(successor) = successor {
        move_default(&mut addresses, user_id, successor, now);
      }
    }
    Ok(true)
  }
}
