// kart_server/src/db/memory/catalog.rs

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::Faults;
use crate::db::{CatalogStore, StoreResult};
use crate::models::{Product, Reservation};

pub struct MemoryCatalogStore {
  products: Mutex<HashMap<Uuid, Product>>,
  faults: Arc<Faults>,
}

impl MemoryCatalogStore {
  pub fn new(faults: Arc<Faults>) -> Self {
    Self {
      products: Mutex::new(HashMap::new()),
      faults,
    }
  }

  /// Catalog administration lives elsewhere; this is for seeding local runs.
  pub fn upsert_product(&self, product: Product) {
    self.products.lock().insert(product.id, product);
  }

  pub fn stock_of(&self, product_id: Uuid) -> Option<i32> {
    self.products.lock().get(&product_id).map(|p| p.stock)
  }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
  async fn product(&self, product_id: Uuid) -> StoreResult<Option<Product>> {
    self.faults.check("catalog.product")?;
    Ok(self.products.lock().get(&product_id).cloned())
  }

  async fn reserve(&self, product_id: Uuid, qty: i32) -> StoreResult<Reservation> {
    self.faults.check("catalog.reserve")?;
    let mut products = self.products.lock();
    let Some(product) = products.get_mut(&product_id) else {
      return Ok(Reservation::UnknownProduct);
    };
    if product.stock < qty {
      return Ok(Reservation::Insufficient {
        available: product.stock,
      });
    }
    product.stock -= qty;
    product.updated_at = Utc::now();
    Ok(Reservation::Reserved(product.clone()))
  }

  async fn release(&self, product_id: Uuid, qty: i32) -> StoreResult<bool> {
    self.faults.check("catalog.release")?;
    let mut products = self.products.lock();
    match products.get_mut(&product_id) {
      Some(product) => {
        product.stock += qty;
        product.updated_at = Utc::now();
        Ok(true)
      }
      None => Ok(false),
    }
  }
}
