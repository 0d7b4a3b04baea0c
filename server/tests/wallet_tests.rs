// tests/wallet_tests.rs
mod common;

use chrono::Duration;
use common::*;
use kart_server::errors::AppError;
use kart_server::flows::contexts::ConfirmCtxData;
use kart_server::models::{OrderStatus, PaymentMethod};
use kart_server::services::{orders, payments, wallet};
use kartflow::ContextData;
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_new_wallet_redeems_pending_cashback_once_per_day() {
  let app = test_app();
  let user = Uuid::new_v4();

  let opened = wallet::account(&app.state, user).await.unwrap();
  assert_eq!(opened.balance_minor, 10_000);
  assert_eq!(opened.pending_cashback_minor, 5_000);

  let redemption = wallet::redeem_cashback(&app.state, user).await.unwrap();
  assert_eq!(redemption.redeemed_minor, 5_000);
  assert_eq!(redemption.account.balance_minor, 15_000);
  assert_eq!(redemption.account.pending_cashback_minor, 0);

  let err = wallet::redeem_cashback(&app.state, user).await.unwrap_err();
  assert!(matches!(err, AppError::AlreadyRedeemedToday));

  app.clock.advance(Duration::days(1));
  let err = wallet::redeem_cashback(&app.state, user).await.unwrap_err();
  assert!(matches!(err, AppError::NoPendingCashback));
  assert_eq!(wallet::account(&app.state, user).await.unwrap().balance_minor, 15_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_redeems_credit_once() {
  let app = test_app();
  let user = Uuid::new_v4();

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let state = app.state.clone();
      tokio::spawn(async move { wallet::redeem_cashback(&state, user).await })
    })
    .collect();

  let mut credited = 0;
  for handle in handles {
    match handle.await.unwrap() {
      Ok(_) => credited += 1,
      Err(AppError::AlreadyRedeemedToday) => {}
      Err(other) => panic!("unexpected error: {other}"),
    }
  }

  assert_eq!(credited, 1);
  assert_eq!(wallet::account(&app.state, user).await.unwrap().balance_minor, 15_000);
}

#[tokio::test]
#[serial]
async fn test_cashback_stops_after_three_paid_orders() {
  let app = test_app();
  let user = Uuid::new_v4();
  let pencil = app.seed_product("Pencil", 100, 10);

  for _ in 0..4 {
    app.add_to_cart(user, pencil, 1).await;
    let order = app.checkout(user, PaymentMethod::Wallet, None).await.unwrap().order;
    let paid = payments::pay_with_wallet(&app.state, user, order.id).await.unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);
  }

  let account = wallet::account(&app.state, user).await.unwrap();
  assert_eq!(account.pending_cashback_minor, 5_000 + 3 * 5_000);
  assert_eq!(account.balance_minor, 10_000 - 4 * 100);
}

#[tokio::test]
#[serial]
async fn test_wallet_pay_needs_enough_balance() {
  let app = test_app();
  let user = Uuid::new_v4();
  let sofa = app.seed_product("Sofa", 20_000, 1);
  app.add_to_cart(user, sofa, 1).await;
  let order = app.checkout(user, PaymentMethod::Wallet, None).await.unwrap().order;

  let err = payments::pay_with_wallet(&app.state, user, order.id).await.unwrap_err();

  assert!(matches!(err, AppError::InsufficientBalance));
  assert_eq!(
    orders::get(&app.state, user, order.id).await.unwrap().status,
    OrderStatus::Pending
  );
  assert_eq!(wallet::account(&app.state, user).await.unwrap().balance_minor, 10_000);
}

#[tokio::test]
#[serial]
async fn test_repeated_wallet_pay_debits_once() {
  let app = test_app();
  let user = Uuid::new_v4();
  let cup = app.seed_product("Cup", 3_000, 2);
  app.add_to_cart(user, cup, 1).await;
  let order = app.checkout(user, PaymentMethod::Wallet, None).await.unwrap().order;

  payments::pay_with_wallet(&app.state, user, order.id).await.unwrap();
  let again = payments::pay_with_wallet(&app.state, user, order.id).await.unwrap();

  assert_eq!(again.status, OrderStatus::Paid);
  assert_eq!(wallet::account(&app.state, user).await.unwrap().balance_minor, 7_000);
}

#[tokio::test]
#[serial]
async fn test_wallet_debit_is_refunded_when_the_order_was_already_paid() {
  let app = test_app();
  let user = Uuid::new_v4();
  let cup = app.seed_product("Cup", 3_000, 2);
  app.add_to_cart(user, cup, 1).await;
  let stale = app.checkout(user, PaymentMethod::Wallet, None).await.unwrap().order;
  payments::pay_with_wallet(&app.state, user, stale.id).await.unwrap();
  let balance_after_first = wallet::account(&app.state, user).await.unwrap().balance_minor;

  // A second confirmation started from the pending snapshot loses at mark_paid.
  let ctx = ContextData::new(ConfirmCtxData::new(app.state.clone(), &stale, None, Some(3_000)));
  let err = app.state.flows.run(ctx.clone()).await.unwrap_err();

  assert!(matches!(err, AppError::OrderNotPending { .. }));
  assert!(ctx.read().lost_race);
  assert!(!ctx.read().wallet_debited);
  assert_eq!(
    wallet::account(&app.state, user).await.unwrap().balance_minor,
    balance_after_first
  );
}
