// kart_server/src/db/postgres/mod.rs

//! Postgres adapters.
//!
//! Two pools: the ledger database (wallet accounts) and the catalog/document
//! database (products, carts, orders, intents, addresses, coupons). There is
//! no transaction spanning the two; cross-store consistency is handled by the
//! flows' compensators.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::{StoreResult, Stores};
use crate::models::coupon::DEFAULT_COUPONS;

mod addresses;
mod cart;
mod catalog;
mod coupons;
mod orders;
mod wallet;

pub use addresses::PostgresAddressStore;
pub use cart::PostgresCartStore;
pub use catalog::PostgresCatalogStore;
pub use coupons::PostgresCouponStore;
pub use orders::PostgresOrderStore;
pub use wallet::PostgresWalletStore;

const LEDGER_SCHEMA: &[&str] = &[r#"
CREATE TABLE IF NOT EXISTS wallet_accounts (
  user_id UUID PRIMARY KEY,
  balance_minor BIGINT NOT NULL CHECK (balance_minor >= 0),
  pending_cashback_minor BIGINT NOT NULL CHECK (pending_cashback_minor >= 0),
  last_cashback_redeem_date DATE,
  updated_at TIMESTAMPTZ NOT NULL
)"#];

const CATALOG_SCHEMA: &[&str] = &[
  r#"
CREATE TABLE IF NOT EXISTS products (
  id UUID PRIMARY KEY,
  name TEXT NOT NULL,
  price_minor BIGINT NOT NULL CHECK (price_minor >= 0),
  stock INTEGER NOT NULL CHECK (stock >= 0),
  category_id UUID,
  image_url TEXT,
  updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
)"#,
  r#"
CREATE TABLE IF NOT EXISTS cart_items (
  id UUID PRIMARY KEY,
  user_id UUID NOT NULL,
  product_id UUID NOT NULL,
  quantity INTEGER NOT NULL CHECK (quantity > 0),
  added_at TIMESTAMPTZ NOT NULL,
  updated_at TIMESTAMPTZ NOT NULL,
  UNIQUE (user_id, product_id)
)"#,
  r#"
CREATE TABLE IF NOT EXISTS orders (
  id UUID PRIMARY KEY,
  user_id UUID NOT NULL,
  status TEXT NOT NULL,
  payment_method TEXT NOT NULL,
  items JSONB NOT NULL,
  shipping_address JSONB NOT NULL,
  total_minor BIGINT NOT NULL,
  discount_minor BIGINT NOT NULL,
  amount_due_minor BIGINT NOT NULL,
  currency TEXT NOT NULL,
  coupon_code TEXT,
  external_payment_ref TEXT,
  payment_id TEXT,
  reservation_expires_at TIMESTAMPTZ,
  stock_reserved BOOLEAN NOT NULL,
  created_at TIMESTAMPTZ NOT NULL,
  updated_at TIMESTAMPTZ NOT NULL
)"#,
  "CREATE INDEX IF NOT EXISTS orders_user_created_idx ON orders (user_id, created_at DESC)",
  "CREATE INDEX IF NOT EXISTS orders_pending_expiry_idx ON orders (reservation_expires_at) WHERE status = 'pending'",
  r#"
CREATE TABLE IF NOT EXISTS payment_intents (
  order_id UUID PRIMARY KEY REFERENCES orders (id),
  external_ref TEXT,
  amount_minor BIGINT NOT NULL,
  currency TEXT NOT NULL,
  status TEXT NOT NULL,
  created_at TIMESTAMPTZ NOT NULL
)"#,
  r#"
CREATE TABLE IF NOT EXISTS addresses (
  id UUID PRIMARY KEY,
  user_id UUID NOT NULL,
  full_name TEXT NOT NULL,
  phone TEXT NOT NULL,
  pincode TEXT NOT NULL,
  address_line1 TEXT NOT NULL,
  address_line2 TEXT,
  landmark TEXT,
  city TEXT NOT NULL,
  state TEXT NOT NULL,
  country TEXT NOT NULL,
  address_type TEXT NOT NULL,
  is_default BOOLEAN NOT NULL DEFAULT FALSE,
  created_at TIMESTAMPTZ NOT NULL,
  updated_at TIMESTAMPTZ NOT NULL
)"#,
  "CREATE UNIQUE INDEX IF NOT EXISTS addresses_single_default_idx ON addresses (user_id) WHERE is_default",
  r#"
CREATE TABLE IF NOT EXISTS coupons (
  code TEXT PRIMARY KEY,
  discount_minor BIGINT NOT NULL CHECK (discount_minor >= 0),
  description TEXT NOT NULL,
  is_active BOOLEAN NOT NULL DEFAULT TRUE
)"#,
  r#"
CREATE TABLE IF NOT EXISTS coupon_redemptions (
  user_id UUID NOT NULL,
  code TEXT NOT NULL REFERENCES coupons (code),
  order_id UUID,
  redeemed_at TIMESTAMPTZ NOT NULL,
  consumed_at TIMESTAMPTZ,
  PRIMARY KEY (user_id, code)
)"#,
];

/// Both connection pools.
#[derive(Clone)]
pub struct PgPools {
  pub ledger: PgPool,
  pub catalog: PgPool,
}

impl PgPools {
  pub async fn connect(ledger_url: &str, catalog_url: &str, max_connections: u32) -> StoreResult<Self> {
    let ledger = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(ledger_url)
      .await?;
    let catalog = PgPoolOptions::new()
      .max_connections(max_connections)
      .connect(catalog_url)
      .await?;
    info!("Connected to ledger and catalog databases.");
    Ok(Self { ledger, catalog })
  }

  /// Creates tables and indexes if missing and inserts the reference coupons.
  pub async fn init_schema(&self) -> StoreResult<()> {
    for statement in LEDGER_SCHEMA {
      sqlx::query(statement).execute(&self.ledger).await?;
    }
    for statement in CATALOG_SCHEMA {
      sqlx::query(statement).execute(&self.catalog).await?;
    }
    for (code, discount_minor, description) in DEFAULT_COUPONS {
      sqlx::query(
        "INSERT INTO coupons (code, discount_minor, description, is_active) VALUES ($1, $2, $3, TRUE) \
         ON CONFLICT (code) DO NOTHING",
      )
      .bind(code)
      .bind(discount_minor)
      .bind(description)
      .execute(&self.catalog)
      .await?;
    }
    info!("Database schema ready.");
    Ok(())
  }

  pub fn stores(&self) -> Stores {
    Stores {
      catalog: Arc::new(PostgresCatalogStore::new(self.catalog.clone())),
      carts: Arc::new(PostgresCartStore::new(self.catalog.clone())),
      orders: Arc::new(PostgresOrderStore::new(self.catalog.clone())),
      addresses: Arc::new(PostgresAddressStore::new(self.catalog.clone())),
      wallets: Arc::new(PostgresWalletStore::new(self.ledger.clone())),
      coupons: Arc::new(PostgresCouponStore::new(self.catalog.clone())),
    }
  }

  pub async fn close(&self) {
    self.ledger.close().await;
    self.catalog.close().await;
  }
}
