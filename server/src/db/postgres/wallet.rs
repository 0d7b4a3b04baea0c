// kart_server/src/db/postgres/wallet.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::db::{StoreResult, WalletStore};
use crate::models::{Redemption, WalletAccount, WalletOpening};

const WALLET_COLUMNS: &str = "user_id, balance_minor, pending_cashback_minor, last_cashback_redeem_date, updated_at";

#[derive(FromRow)]
struct RedeemRow {
  redeemed_minor: i64,
  #[sqlx(flatten)]
  account: WalletAccount,
}

pub struct PostgresWalletStore {
  pool: PgPool,
}

impl PostgresWalletStore {
  pub fn new(pool: PgPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl WalletStore for PostgresWalletStore {
  async fn open_or_get(&self, user_id: Uuid, opening: WalletOpening, now: DateTime<Utc>) -> StoreResult<WalletAccount> {
    sqlx::query(
      "INSERT INTO wallet_accounts (user_id, balance_minor, pending_cashback_minor, last_cashback_redeem_date, updated_at) \
       VALUES ($1, $2, $3, NULL, $4) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .bind(opening.balance_minor)
    .bind(opening.pending_cashback_minor)
    .bind(now)
    .execute(&self.pool)
    .await?;

    let account = sqlx::query_as::<_, WalletAccount>(&format!(
      "SELECT {WALLET_COLUMNS} FROM wallet_accounts WHERE user_id = $1"
    ))
    .bind(user_id)
    .fetch_one(&self.pool)
    .await?;
    Ok(account)
  }

  async fn credit_pending(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<Option<WalletAccount>> {
    Ok(
      sqlx::query_as::<_, WalletAccount>(&format!(
        "UPDATE wallet_accounts SET pending_cashback_minor = pending_cashback_minor + $2, updated_at = $3 \
         WHERE user_id = $1 RETURNING {WALLET_COLUMNS}"
      ))
      .bind(user_id)
      .bind(amount)
      .bind(now)
      .fetch_optional(&self.pool)
      .await?,
    )
  }

  async fn reverse_pending(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<bool> {
    let result = sqlx::query(
      "UPDATE wallet_accounts SET pending_cashback_minor = pending_cashback_minor - $2, updated_at = $3 \
       WHERE user_id = $1 AND pending_cashback_minor >= $2",
    )
    .bind(user_id)
    .bind(amount)
    .bind(now)
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn redeem(&self, user_id: Uuid, today: NaiveDate, now: DateTime<Utc>) -> StoreResult<Option<Redemption>> {
    // The CTE locks the row and captures the amount being moved; the guard is
    // re-checked after the lock so a concurrent redeem on the same day loses.
    let row = sqlx::query_as::<_, RedeemRow>(
      "WITH prior AS ( \
         SELECT user_id, pending_cashback_minor FROM wallet_accounts \
         WHERE user_id = $1 AND pending_cashback_minor > 0 \
           AND (last_cashback_redeem_date IS NULL OR last_cashback_redeem_date <> $2) \
         FOR UPDATE \
       ) \
       UPDATE wallet_accounts w \
       SET balance_minor = w.balance_minor + prior.pending_cashback_minor, \
           pending_cashback_minor = 0, \
           last_cashback_redeem_date = $2, \
           updated_at = $3 \
       FROM prior \
       WHERE w.user_id = prior.user_id \
         AND w.pending_cashback_minor > 0 \
         AND (w.last_cashback_redeem_date IS NULL OR w.last_cashback_redeem_date <> $2) \
       RETURNING prior.pending_cashback_minor AS redeemed_minor, w.user_id, w.balance_minor, \
         w.pending_cashback_minor, w.last_cashback_redeem_date, w.updated_at",
    )
    .bind(user_id)
    .bind(today)
    .bind(now)
    .fetch_optional(&self.pool)
    .await?;

    Ok(row.map(|r| Redemption {
      redeemed_minor: r.redeemed_minor,
      account: r.account,
    }))
  }

  async fn debit(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<Option<WalletAccount>> {
    Ok(
      sqlx::query_as::<_, WalletAccount>(&format!(
        "UPDATE wallet_accounts SET balance_minor = balance_minor - $2, updated_at = $3 \
         WHERE user_id = $1 AND balance_minor >= $2 RETURNING {WALLET_COLUMNS}"
      ))
      .bind(user_id)
      .bind(amount)
      .bind(now)
      .fetch_optional(&self.pool)
      .await?,
    )
  }

  async fn credit(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<Option<WalletAccount>> {
    Ok(
      sqlx::query_as::<_, WalletAccount>(&format!(
        "UPDATE wallet_accounts SET balance_minor = balance_minor + $2, updated_at = $3 \
         WHERE user_id = $1 RETURNING {WALLET_COLUMNS}"
      ))
      .bind(user_id)
      .bind(amount)
      .bind(now)
      .fetch_optional(&self.pool)
      .await?,
    )
  }
}
