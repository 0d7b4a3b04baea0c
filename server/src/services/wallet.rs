// kart_server/src/services/wallet.rs

//! Wallet ledger. Every balance change is a single conditional store write;
//! nothing here reads a balance and writes it back.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::{Redemption, WalletAccount, WalletOpening};
use crate::state::AppState;

fn opening(state: &AppState) -> WalletOpening {
  WalletOpening {
    balance_minor: state.config.wallet_opening_balance_minor,
    pending_cashback_minor: state.config.wallet_opening_cashback_minor,
  }
}

/// Reads the account, opening it on first touch.
#[instrument(name = "wallet::account", skip(state))]
pub async fn account(state: &AppState, user_id: Uuid) -> Result<WalletAccount> {
  Ok(
    state
      .stores
      .wallets
      .open_or_get(user_id, opening(state), state.clock.now())
      .await?,
  )
}

/// Credits the configured cashback to pending if the user's paid-order count
/// (this order included) is within the cap. Returns the amount credited.
#[instrument(name = "wallet::accrue_cashback", skip(state))]
pub async fn accrue_cashback(state: &AppState, user_id: Uuid, order_id: Uuid) -> Result<i64> {
  let amount = state.config.cashback_amount_minor;
  let paid_orders = state.stores.orders.count_paid(user_id).await?;
  if paid_orders > state.config.cashback_order_cap || amount == 0 {
    info!(paid_orders, "Cashback cap reached; nothing accrued.");
    return Ok(0);
  }

  account(state, user_id).await?;
  state
    .stores
    .wallets
    .credit_pending(user_id, amount, state.clock.now())
    .await?
    .ok_or_else(|| AppError::Internal(format!("wallet for user {} vanished during accrual", user_id)))?;
  info!(amount, paid_orders, "Cashback accrued.");
  Ok(amount)
}

/// Takes back an accrual. False when pending no longer covers it.
#[instrument(name = "wallet::reverse_accrual", skip(state))]
pub async fn reverse_accrual(state: &AppState, user_id: Uuid, amount: i64) -> Result<bool> {
  let reversed = state
    .stores
    .wallets
    .reverse_pending(user_id, amount, state.clock.now())
    .await?;
  if !reversed {
    warn!(amount, "Pending cashback no longer covers the reversal.");
  }
  Ok(reversed)
}

/// Moves all pending cashback into the balance, at most once per UTC day.
#[instrument(name = "wallet::redeem_cashback", skip(state))]
pub async fn redeem_cashback(state: &AppState, user_id: Uuid) -> Result<Redemption> {
  account(state, user_id).await?;
  let today = state.clock.today();
  if let Some(redemption) = state
    .stores
    .wallets
    .redeem(user_id, today, state.clock.now())
    .await?
  {
    info!(
      redeemed_minor = redemption.redeemed_minor,
      balance_minor = redemption.account.balance_minor,
      "Cashback redeemed."
    );
    return Ok(redemption);
  }

  // Nothing was written; report which guard refused it.
  let current = account(state, user_id).await?;
  if current.last_cashback_redeem_date == Some(today) {
    Err(AppError::AlreadyRedeemedToday)
  } else {
    Err(AppError::NoPendingCashback)
  }
}

#[instrument(name = "wallet::debit", skip(state))]
pub async fn debit(state: &AppState, user_id: Uuid, amount: i64) -> Result<WalletAccount> {
  if amount < 0 {
    return Err(AppError::Validation("Debit amount must not be negative".to_string()));
  }
  account(state, user_id).await?;
  state
    .stores
    .wallets
    .debit(user_id, amount, state.clock.now())
    .await?
    .ok_or(AppError::InsufficientBalance)
}

#[instrument(name = "wallet::credit", skip(state))]
pub async fn credit(state: &AppState, user_id: Uuid, amount: i64) -> Result<WalletAccount> {
  if amount < 0 {
    return Err(AppError::Validation("Credit amount must not be negative".to_string()));
  }
  account(state, user_id).await?;
  state
    .stores
    .wallets
    .credit(user_id, amount, state.clock.now())
    .await?
    .ok_or_else(|| AppError::Internal(format!("wallet for user {} vanished during credit", user_id)))
}
