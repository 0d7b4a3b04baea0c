// kart_server/src/db/postgres/catalog.rs

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::{CatalogStore, StoreResult};
use crate::models::{Product, Reservation};

const PRODUCT_COLUMNS: &str = "id, name, price_minor, stock, category_id, image_url, updated_at";

pub struct PostgresCatalogStore {
  pool: PgPool,
}

impl PostgresCatalogStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
  async fn product(&self, product_id: Uuid) -> StoreResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    let product = sqlx::query_as::<_, Product>(&sql)
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(product)
  }

  async fn reserve(&self, product_id: Uuid, qty: i32) -> StoreResult<Reservation> {
    let sql = format!(
      "UPDATE products SET stock = stock - $2, updated_at = now() \
       WHERE id = $1 AND stock >= $2 RETURNING {PRODUCT_COLUMNS}"
    );
    let reserved = sqlx::query_as::<_, Product>(&sql)
      .bind(product_id)
      .bind(qty)
      .fetch_optional(&self.pool)
      .await?;
    if let Some(product) = reserved {
      return Ok(Reservation::Reserved(product));
    }

    // Nothing was written; find out why for the error message.
    let available: Option<i32> = sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
      .bind(product_id)
      .fetch_optional(&self.pool)
      .await?;
    Ok(match available {
      Some(available) => Reservation::Insufficient { available },
      None => Reservation::UnknownProduct,
    })
  }

  async fn release(&self, product_id: Uuid, qty: i32) -> StoreResult<bool> {
    let result = sqlx::query("UPDATE products SET stock = stock + $2, updated_at = now() WHERE id = $1")
      .bind(product_id)
      .bind(qty)
      .execute(&self.pool)
      .await?;
    Ok(result.rows_affected() == 1)
  }
}
