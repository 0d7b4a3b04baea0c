// kart_server/src/models/wallet.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow, PartialEq, Eq)]
pub struct WalletAccount {
  pub user_id: Uuid,
  pub balance_minor: i64,
  pub pending_cashback_minor: i64,
  pub last_cashback_redeem_date: Option<NaiveDate>,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Redemption {
  pub redeemed_minor: i64,
  pub account: WalletAccount,
}

/// Opening amounts for an account created on first touch.
#[derive(Debug, Clone, Copy)]
pub struct WalletOpening {
  pub balance_minor: i64,
  pub pending_cashback_minor: i64,
}
