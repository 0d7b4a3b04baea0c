// kart_server/src/db/mod.rs

//! Store traits and the handles bundle carried in `AppState`.
//!
//! Every mutating method is one atomic operation against its store: a single
//! conditional SQL statement (or one transaction for the address book) in
//! Postgres, one critical section in memory. Methods that can lose a race
//! return `bool`/`Option` so the caller can tell "applied" from "someone else
//! got there first" without a second read.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
  Address, AddressDraft, AddressPatch, CartItem, Coupon, CouponRedemption, DefaultPolicy, Order, PaymentIntent,
  Product, Redemption, Reservation, WalletAccount, WalletOpening,
};

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("store unavailable: {0}")]
  Unavailable(String),

  #[error("constraint violated: {0}")]
  Conflict(String),

  #[error("stored record is invalid: {0}")]
  Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
  fn from(err: sqlx::Error) -> Self {
    match &err {
      sqlx::Error::Database(db_err) if db_err.is_unique_violation() || db_err.is_check_violation() => {
        StoreError::Conflict(db_err.message().to_string())
      }
      sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
        StoreError::Corrupt(err.to_string())
      }
      _ => StoreError::Unavailable(err.to_string()),
    }
  }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait CatalogStore: Send + Sync {
  async fn product(&self, product_id: Uuid) -> StoreResult<Option<Product>>;

  /// `stock -= qty` only when `stock >= qty`.
  async fn reserve(&self, product_id: Uuid, qty: i32) -> StoreResult<Reservation>;

  /// `stock += qty`. Returns false when the product no longer exists.
  async fn release(&self, product_id: Uuid, qty: i32) -> StoreResult<bool>;
}

#[async_trait]
pub trait CartStore: Send + Sync {
  /// Newest first.
  async fn lines(&self, user_id: Uuid) -> StoreResult<Vec<CartItem>>;

  async fn line(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<Option<CartItem>>;

  /// Inserts or increments the line, storing `min(existing + qty, cap)`.
  async fn upsert_clamped(
    &self,
    user_id: Uuid,
    product_id: Uuid,
    qty: i32,
    cap: i32,
    now: DateTime<Utc>,
  ) -> StoreResult<CartItem>;

  async fn set_quantity(&self, user_id: Uuid, item_id: Uuid, qty: i32, now: DateTime<Utc>)
    -> StoreResult<Option<CartItem>>;

  async fn remove(&self, user_id: Uuid, item_id: Uuid) -> StoreResult<bool>;

  async fn clear(&self, user_id: Uuid) -> StoreResult<u64>;
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Persists a new order, together with its intent row when given.
  async fn insert(&self, order: &Order, intent: Option<&PaymentIntent>) -> StoreResult<()>;

  async fn get(&self, order_id: Uuid) -> StoreResult<Option<Order>>;

  /// Newest first.
  async fn list_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Order>>;

  /// Orders in paid, shipped or delivered.
  async fn count_paid(&self, user_id: Uuid) -> StoreResult<i64>;

  /// pending → paid, only while the reservation deadline (if any) is in the
  /// future. `None` means the caller lost: the order was not pending or had
  /// expired.
  async fn mark_paid(&self, order_id: Uuid, payment_id: Option<&str>, now: DateTime<Utc>)
    -> StoreResult<Option<Order>>;

  /// paid → pending. Compensation only.
  async fn revert_paid(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;

  /// pending → cancelled.
  async fn cancel(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Order>>;

  /// pending → cancelled, only once the reservation deadline has passed.
  async fn expire(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Order>>;

  /// Flips `stock_reserved` true → false on a cancelled order. Exactly one
  /// caller gets `true` and must put the stock back.
  async fn claim_stock_release(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;

  /// Pending orders whose reservation deadline has passed, oldest first.
  async fn expired_pending(&self, now: DateTime<Utc>, limit: i64) -> StoreResult<Vec<Order>>;

  /// Cancelled orders that still hold stock.
  async fn stranded_reservations(&self, limit: i64) -> StoreResult<Vec<Order>>;

  /// Inserts the intent row; `false` when the order already has one.
  async fn claim_intent(&self, intent: &PaymentIntent) -> StoreResult<bool>;

  /// creating → created, recording the gateway reference on the intent and
  /// on the (still pending) order. An order without a reservation deadline
  /// gets `expires_at`.
  async fn attach_intent(
    &self,
    order_id: Uuid,
    external_ref: &str,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> StoreResult<bool>;

  /// Deletes an intent that never got a gateway reference.
  async fn drop_intent_claim(&self, order_id: Uuid) -> StoreResult<bool>;

  async fn intent(&self, order_id: Uuid) -> StoreResult<Option<PaymentIntent>>;

  /// created → paid.
  async fn settle_intent(&self, order_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait AddressStore: Send + Sync {
  /// Default first, then newest first.
  async fn list(&self, user_id: Uuid) -> StoreResult<Vec<Address>>;

  async fn get(&self, user_id: Uuid, address_id: Uuid) -> StoreResult<Option<Address>>;

  async fn default_for(&self, user_id: Uuid) -> StoreResult<Option<Address>>;

  async fn create(
    &self,
    user_id: Uuid,
    draft: &AddressDraft,
    policy: DefaultPolicy,
    now: DateTime<Utc>,
  ) -> StoreResult<Address>;

  /// Field update; `patch.is_default == Some(true)` also moves the default here.
  async fn update(
    &self,
    user_id: Uuid,
    address_id: Uuid,
    patch: &AddressPatch,
    now: DateTime<Utc>,
  ) -> StoreResult<Option<Address>>;

  async fn set_default(&self, user_id: Uuid, address_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Address>>;

  /// Deleting the default promotes the most recently created remaining address.
  async fn delete(&self, user_id: Uuid, address_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;
}

#[async_trait]
pub trait WalletStore: Send + Sync {
  /// Creates the account with `opening` amounts if it does not exist yet.
  async fn open_or_get(&self, user_id: Uuid, opening: WalletOpening, now: DateTime<Utc>) -> StoreResult<WalletAccount>;

  async fn credit_pending(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<Option<WalletAccount>>;

  /// `pending -= amount` only when `pending >= amount`.
  async fn reverse_pending(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<bool>;

  /// Moves all pending cashback into the balance and stamps `today`, only if
  /// nothing was redeemed today and something is pending.
  async fn redeem(&self, user_id: Uuid, today: NaiveDate, now: DateTime<Utc>) -> StoreResult<Option<Redemption>>;

  /// `balance -= amount` only when `balance >= amount`.
  async fn debit(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<Option<WalletAccount>>;

  async fn credit(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<Option<WalletAccount>>;
}

#[async_trait]
pub trait CouponStore: Send + Sync {
  async fn coupon(&self, code: &str) -> StoreResult<Option<Coupon>>;

  async fn active_coupons(&self) -> StoreResult<Vec<Coupon>>;

  async fn redemptions_for_user(&self, user_id: Uuid) -> StoreResult<Vec<CouponRedemption>>;

  async fn redemption(&self, user_id: Uuid, code: &str) -> StoreResult<Option<CouponRedemption>>;

  /// `false` when the `(user, code)` row already exists.
  async fn insert_redemption(&self, user_id: Uuid, code: &str, now: DateTime<Utc>) -> StoreResult<bool>;

  /// Deletes the `(user, code)` row while it is neither held nor consumed.
  async fn delete_unheld_redemption(&self, user_id: Uuid, code: &str) -> StoreResult<bool>;

  /// Ties an unconsumed, unheld redemption to a pending order.
  async fn hold(&self, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool>;

  async fn release_hold(&self, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool>;

  async fn consume(&self, user_id: Uuid, code: &str, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<bool>;

  /// Compensation only.
  async fn unconsume(&self, user_id: Uuid, code: &str, order_id: Uuid) -> StoreResult<bool>;
}

/// Store handles built once at startup.
#[derive(Clone)]
pub struct Stores {
  pub catalog: Arc<dyn CatalogStore>,
  pub carts: Arc<dyn CartStore>,
  pub orders: Arc<dyn OrderStore>,
  pub addresses: Arc<dyn AddressStore>,
  pub wallets: Arc<dyn WalletStore>,
  pub coupons: Arc<dyn CouponStore>,
}
