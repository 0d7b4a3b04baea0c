// kart_server/src/db/postgres/addresses.rs

//! Every mutation runs in one transaction holding a per-user advisory lock,
//! so "first address", default moves and promotion on delete never interleave
//! for the same user. The partial unique index backs the single-default rule.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::db::{AddressStore, StoreResult};
use crate::models::{Address, AddressDraft, AddressPatch, DefaultPolicy};

const ADDRESS_COLUMNS: &str = "id, user_id, full_name, phone, pincode, address_line1, address_line2, landmark, \
  city, state, country, address_type, is_default, created_at, updated_at";

pub struct PostgresAddressStore {
  pool: PgPool,
}

impl PostgresAddressStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }

  async fn begin_for_user(&self, user_id: Uuid) -> StoreResult<Transaction<'static, Postgres>> {
    let mut tx = self.pool.begin().await?;
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
      .bind(user_id)
      .execute(&mut *tx)
      .await?;
    Ok(tx)
  }
}

async fn clear_default(tx: &mut Transaction<'static, Postgres>, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<()> {
  sqlx::query("UPDATE addresses SET is_default = FALSE, updated_at = $2 WHERE user_id = $1 AND is_default")
    .bind(user_id)
    .bind(now)
    .execute(&mut **tx)
    .await?;
  Ok(())
}

async fn make_default(
  tx: &mut Transaction<'static, Postgres>,
  user_id: Uuid,
  address_id: Uuid,
  now: DateTime<Utc>,
) -> StoreResult<Option<Address>> {
  clear_default(tx, user_id, now).await?;
  Ok(
    sqlx::query_as::<_, Address>(&format!(
      "UPDATE addresses SET is_default = TRUE, updated_at = $3 WHERE user_id = $1 AND id = $2 \
       RETURNING {ADDRESS_COLUMNS}"
    ))
    .bind(user_id)
    .bind(address_id)
    .bind(now)
    .fetch_optional(&mut **tx)
    .await?,
  )
}

#[async_trait]
impl AddressStore for PostgresAddressStore {
  async fn list(&self, user_id: Uuid) -> StoreResult<Vec<Address>> {
    Ok(
      sqlx::query_as::<_, Address>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 \
         ORDER BY is_default DESC, created_at DESC, id DESC"
      ))
      .bind(user_id)
      .fetch_all(&self.pool)
      .await?,
    )
  }

  async fn get(&self, user_id: Uuid, address_id: Uuid) -> StoreResult<Option<Address>> {
    Ok(
      sqlx::query_as::<_, Address>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 AND id = $2"
      ))
      .bind(user_id)
      .bind(address_id)
      .fetch_optional(&self.pool)
      .await?,
    )
  }

  async fn default_for(&self, user_id: Uuid) -> StoreResult<Option<Address>> {
    Ok(
      sqlx::query_as::<_, Address>(&format!(
        "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 AND is_default"
      ))
      .bind(user_id)
      .fetch_optional(&self.pool)
      .await?,
    )
  }

  async fn create(
    &self,
    user_id: Uuid,
    draft: &AddressDraft,
    policy: DefaultPolicy,
    now: DateTime<Utc>,
  ) -> StoreResult<Address> {
    let mut tx = self.begin_for_user(user_id).await?;

    let has_any: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM addresses WHERE user_id = $1)")
      .bind(user_id)
      .fetch_one(&mut *tx)
      .await?;
    let is_default = !has_any || policy == DefaultPolicy::Always;
    if is_default {
      clear_default(&mut tx, user_id, now).await?;
    }

    let address = sqlx::query_as::<_, Address>(&format!(
      "INSERT INTO addresses ({ADDRESS_COLUMNS}) \
       VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $14) \
       RETURNING {ADDRESS_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(&draft.full_name)
    .bind(&draft.phone)
    .bind(&draft.pincode)
    .bind(&draft.address_line1)
    .bind(&draft.address_line2)
    .bind(&draft.landmark)
    .bind(&draft.city)
    .bind(&draft.state)
    .bind(&draft.country)
    .bind(&draft.address_type)
    .bind(is_default)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(address)
  }

  async fn update(
    &self,
    user_id: Uuid,
    address_id: Uuid,
    patch: &AddressPatch,
    now: DateTime<Utc>,
  ) -> StoreResult<Option<Address>> {
    let mut tx = self.begin_for_user(user_id).await?;

    let current = sqlx::query_as::<_, Address>(&format!(
      "SELECT {ADDRESS_COLUMNS} FROM addresses WHERE user_id = $1 AND id = $2"
    ))
    .bind(user_id)
    .bind(address_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(mut address) = current else {
      return Ok(None);
    };
    patch.apply_to(&mut address);

    let mut updated = sqlx::query_as::<_, Address>(&format!(
      "UPDATE addresses SET full_name = $3, phone = $4, pincode = $5, address_line1 = $6, address_line2 = $7, \
       landmark = $8, city = $9, state = $10, country = $11, address_type = $12, updated_at = $13 \
       WHERE user_id = $1 AND id = $2 RETURNING {ADDRESS_COLUMNS}"
    ))
    .bind(user_id)
    .bind(address_id)
    .bind(&address.full_name)
    .bind(&address.phone)
    .bind(&address.pincode)
    .bind(&address.address_line1)
    .bind(&address.address_line2)
    .bind(&address.landmark)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.country)
    .bind(&address.address_type)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await?;

    if patch.is_default == Some(true) && updated.is_some() {
      updated = make_default(&mut tx, user_id, address_id, now).await?;
    }
    tx.commit().await?;
    Ok(updated)
  }

  async fn set_default(&self, user_id: Uuid, address_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Address>> {
    let mut tx = self.begin_for_user(user_id).await?;
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM addresses WHERE user_id = $1 AND id = $2)")
      .bind(user_id)
      .bind(address_id)
      .fetch_one(&mut *tx)
      .await?;
    if !exists {
      return Ok(None);
    }
    let address = make_default(&mut tx, user_id, address_id, now).await?;
    tx.commit().await?;
    Ok(address)
  }

  async fn delete(&self, user_id: Uuid, address_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool> {
    let mut tx = self.begin_for_user(user_id).await?;
    let removed: Option<bool> =
      sqlx::query_scalar("DELETE FROM addresses WHERE user_id = $1 AND id = $2 RETURNING is_default")
        .bind(user_id)
        .bind(address_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(was_default) = removed else {
      return Ok(false);
    };

    if was_default {
      sqlx::query(
        "UPDATE addresses SET is_default = TRUE, updated_at = $2 WHERE id = ( \
           SELECT id FROM addresses WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT 1 \
         )",
      )
      .bind(user_id)
      .bind(now)
      .execute(&mut *tx)
      .await?;
    }
    tx.commit().await?;
    Ok(true)
  }
}
