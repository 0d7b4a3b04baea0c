// kart_server/src/db/memory/mod.rs

//! In-process stores for local runs and tests.
//!
//! Each operation takes its store's lock exactly once, which is what a single
//! conditional statement gives the Postgres adapters. Named fault points let
//! tests fail a specific operation between flow steps.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{StoreError, StoreResult, Stores};

mod addresses;
mod cart;
mod catalog;
mod coupons;
mod orders;
mod wallet;

pub use addresses::MemoryAddressStore;
pub use cart::MemoryCartStore;
pub use catalog::MemoryCatalogStore;
pub use coupons::MemoryCouponStore;
pub use orders::MemoryOrderStore;
pub use wallet::MemoryWalletStore;

/// Armed failures, keyed by operation name such as `"orders.mark_paid"`.
#[derive(Debug, Default)]
pub struct Faults {
  armed: Mutex<HashMap<&'static str, u32>>,
}

impl Faults {
  /// Makes the next `times` calls of `op` fail with `StoreError::Unavailable`.
  pub fn fail_next(&self, op: &'static str, times: u32) {
    self.armed.lock().insert(op, times);
  }

  pub fn clear(&self) {
    self.armed.lock().clear();
  }

  pub(crate) fn check(&self, op: &'static str) -> StoreResult<()> {
    let mut armed = self.armed.lock();
    match armed.get_mut(op) {
      Some(remaining) if *remaining > 0 => {
        *remaining -= 1;
        tracing::debug!(op, "Injected store failure.");
        Err(StoreError::Unavailable(format!("injected failure in {}", op)))
      }
      _ => Ok(()),
    }
  }
}

/// All memory stores plus their shared fault switchboard.
#[derive(Clone)]
pub struct MemoryBackend {
  pub catalog: Arc<MemoryCatalogStore>,
  pub carts: Arc<MemoryCartStore>,
  pub orders: Arc<MemoryOrderStore>,
  pub addresses: Arc<MemoryAddressStore>,
  pub wallets: Arc<MemoryWalletStore>,
  pub coupons: Arc<MemoryCouponStore>,
  pub faults: Arc<Faults>,
}

impl Default for MemoryBackend {
  fn default() -> Self {
    Self::new()
  }
}

impl MemoryBackend {
  pub fn new() -> Self {
    let faults = Arc::new(Faults::default());
    Self {
      catalog: Arc::new(MemoryCatalogStore::new(faults.clone())),
      carts: Arc::new(MemoryCartStore::new(faults.clone())),
      orders: Arc::new(MemoryOrderStore::new(faults.clone())),
      addresses: Arc::new(MemoryAddressStore::new(faults.clone())),
      wallets: Arc::new(MemoryWalletStore::new(faults.clone())),
      coupons: Arc::new(MemoryCouponStore::with_default_coupons(faults.clone())),
      faults,
    }
  }

  pub fn stores(&self) -> Stores {
    Stores {
      catalog: self.catalog.clone(),
      carts: self.carts.clone(),
      orders: self.orders.clone(),
      addresses: self.addresses.clone(),
      wallets: self.wallets.clone(),
      coupons: self.coupons.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn faults_fire_the_requested_number_of_times() {
    let faults = Faults::default();
    faults.fail_next("orders.mark_paid", 2);
    assert!(faults.check("orders.mark_paid").is_err());
    assert!(faults.check("orders.mark_paid").is_err());
    assert!(faults.check("orders.mark_paid").is_ok());
    assert!(faults.check("wallet.redeem").is_ok());
  }
}
