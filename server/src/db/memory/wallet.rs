// kart_server/src/db/memory/wallet.rs

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::Faults;
use crate::db::{StoreResult, WalletStore};
use crate::models::{Redemption, WalletAccount, WalletOpening};

pub struct MemoryWalletStore {
  accounts: Mutex<HashMap<Uuid, WalletAccount>>,
  faults: Arc<Faults>,
}

impl MemoryWalletStore {
  pub fn new(faults: Arc<Faults>) -> Self {
    Self {
      accounts: Mutex::new(HashMap::new()),
      faults,
    }
  }

  /// Applies `f` to the account when `guard` accepts it.
  fn conditional<R>(
    &self,
    user_id: Uuid,
    guard: impl FnOnce(&WalletAccount) -> bool,
    f: impl FnOnce(&mut WalletAccount) -> R,
  ) -> Option<R> {
    let mut accounts = self.accounts.lock();
    let account = accounts.get_mut(&user_id)?;
    if !guard(account) {
      return None;
    }
    Some(f(account))
  }
}

#[async_trait]
impl WalletStore for MemoryWalletStore {
  async fn open_or_get(&self, user_id: Uuid, opening: WalletOpening, now: DateTime<Utc>) -> StoreResult<WalletAccount> {
    self.faults.check("wallet.open_or_get")?;
    let mut accounts = self.accounts.lock();
    let account = accounts.entry(user_id).or_insert_with(|| WalletAccount {
      user_id,
      balance_minor: opening.balance_minor,
      pending_cashback_minor: opening.pending_cashback_minor,
      last_cashback_redeem_date: None,
      updated_at: now,
    });
    Ok(account.clone())
  }

  async fn credit_pending(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<Option<WalletAccount>> {
    self.faults.check("wallet.credit_pending")?;
    Ok(self.conditional(
      user_id,
      |_| true,
      |a| {
        a.pending_cashback_minor += amount;
        a.updated_at = now;
        a.clone()
      },
    ))
  }

  async fn reverse_pending(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<bool> {
    self.faults.check("wallet.reverse_pending")?;
    Ok(
      self
        .conditional(
          user_id,
          |a| a.pending_cashback_minor >= amount,
          |a| {
            a.pending_cashback_minor -= amount;
            a.updated_at = now;
          },
        )
        .is_some(),
    )
  }

  async fn redeem(&self, user_id: Uuid, today: NaiveDate, now: DateTime<Utc>) -> StoreResult<Option<Redemption>> {
    self.faults.check("wallet.redeem")?;
    Ok(self.conditional(
      user_id,
      |a| a.last_cashback_redeem_date != Some(today) && a.pending_cashback_minor > 0,
      |a| {
        let redeemed_minor = a.pending_cashback_minor;
        a.balance_minor += redeemed_minor;
        a.pending_cashback_minor = 0;
        a.last_cashback_redeem_date = Some(today);
        a.updated_at = now;
        Redemption {
          redeemed_minor,
          account: a.clone(),
        }
      },
    ))
  }

  async fn debit(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<Option<WalletAccount>> {
    self.faults.check("wallet.debit")?;
    Ok(self.conditional(
      user_id,
      |a| a.balance_minor >= amount,
      |a| {
        a.balance_minor -= amount;
        a.updated_at = now;
        a.clone()
      },
    ))
  }

  async fn credit(&self, user_id: Uuid, amount: i64, now: DateTime<Utc>) -> StoreResult<Option<WalletAccount>> {
    self.faults.check("wallet.credit")?;
    Ok(self.conditional(
      user_id,
      |_| true,
      |a| {
        a.balance_minor += amount;
        a.updated_at = now;
        a.clone()
      },
    ))
  }
}
