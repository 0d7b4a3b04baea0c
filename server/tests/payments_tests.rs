// tests/payments_tests.rs
mod common;

use chrono::Duration;
use common::*;
use kart_server::errors::AppError;
use kart_server::models::{IntentStatus, OrderStatus, PaymentMethod};
use kart_server::services::{orders, payments, wallet};
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_verify_marks_paid_and_accrues_cashback_once() {
  let app = test_app();
  let user = Uuid::new_v4();
  let mug = app.seed_product("Mug", 19_900, 4);
  app.add_to_cart(user, mug, 1).await;
  let outcome = app.checkout(user, PaymentMethod::Online, None).await.unwrap();
  let confirmation = app.confirmation_for(&outcome, "pay_001");

  let paid = payments::verify(&app.state, user, confirmation.clone()).await.unwrap();
  assert_eq!(paid.status, OrderStatus::Paid);
  assert_eq!(paid.payment_id.as_deref(), Some("pay_001"));

  let intent = app.state.stores.orders.intent(paid.id).await.unwrap().unwrap();
  assert_eq!(intent.status, IntentStatus::Paid);
  let account = wallet::account(&app.state, user).await.unwrap();
  assert_eq!(account.pending_cashback_minor, 10_000);

  // A retried callback returns the same paid order and changes nothing.
  let again = payments::verify(&app.state, user, confirmation).await.unwrap();
  assert_eq!(again.status, OrderStatus::Paid);
  assert_eq!(wallet::account(&app.state, user).await.unwrap(), account);
  assert_eq!(app.stock_of(mug), 3);
}

#[tokio::test]
#[serial]
async fn test_concurrent_verifies_confirm_once() {
  let app = test_app();
  let user = Uuid::new_v4();
  let mug = app.seed_product("Mug", 19_900, 4);
  app.add_to_cart(user, mug, 1).await;
  let outcome = app.checkout(user, PaymentMethod::Online, None).await.unwrap();
  let confirmation = app.confirmation_for(&outcome, "pay_002");

  let (a, b) = tokio::join!(
    payments::verify(&app.state, user, confirmation.clone()),
    payments::verify(&app.state, user, confirmation.clone()),
  );

  assert_eq!(a.unwrap().status, OrderStatus::Paid);
  assert_eq!(b.unwrap().status, OrderStatus::Paid);
  let account = wallet::account(&app.state, user).await.unwrap();
  assert_eq!(account.pending_cashback_minor, 10_000, "cashback accrues exactly once");
}

#[tokio::test]
#[serial]
async fn test_bad_signature_is_rejected_and_order_stays_pending() {
  let app = test_app();
  let user = Uuid::new_v4();
  let mug = app.seed_product("Mug", 19_900, 4);
  app.add_to_cart(user, mug, 1).await;
  let outcome = app.checkout(user, PaymentMethod::Online, None).await.unwrap();
  let mut confirmation = app.confirmation_for(&outcome, "pay_003");
  confirmation.signature = "0".repeat(64);

  let err = payments::verify(&app.state, user, confirmation).await.unwrap_err();

  assert!(matches!(err, AppError::InvalidSignature));
  let order = orders::get(&app.state, user, outcome.order.id).await.unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
}

#[tokio::test]
#[serial]
async fn test_signature_for_another_gateway_order_is_rejected() {
  let app = test_app();
  let user = Uuid::new_v4();
  let mug = app.seed_product("Mug", 19_900, 4);
  app.add_to_cart(user, mug, 1).await;
  let outcome = app.checkout(user, PaymentMethod::Online, None).await.unwrap();
  // Correctly signed, but for a gateway order this order never opened.
  let confirmation = app.confirmation(outcome.order.id, "mock_order_someone_else", "pay_004");

  let err = payments::verify(&app.state, user, confirmation).await.unwrap_err();
  assert!(matches!(err, AppError::InvalidSignature));
}

#[tokio::test]
#[serial]
async fn test_verify_of_another_users_order_is_not_found() {
  let app = test_app();
  let owner = Uuid::new_v4();
  let mug = app.seed_product("Mug", 19_900, 4);
  app.add_to_cart(owner, mug, 1).await;
  let outcome = app.checkout(owner, PaymentMethod::Online, None).await.unwrap();
  let confirmation = app.confirmation_for(&outcome, "pay_005");

  let err = payments::verify(&app.state, Uuid::new_v4(), confirmation).await.unwrap_err();
  assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
#[serial]
async fn test_late_verify_after_expiry_releases_stock() {
  let app = test_app();
  let user = Uuid::new_v4();
  let mug = app.seed_product("Mug", 19_900, 1);
  app.add_to_cart(user, mug, 1).await;
  let outcome = app.checkout(user, PaymentMethod::Online, None).await.unwrap();
  assert_eq!(app.stock_of(mug), 0);

  app.clock.advance(Duration::minutes(16));
  let err = payments::verify(&app.state, user, app.confirmation_for(&outcome, "pay_006"))
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::OrderExpired(id) if id == outcome.order.id));
  let order = orders::get(&app.state, user, outcome.order.id).await.unwrap();
  assert_eq!(order.status, OrderStatus::Cancelled);
  assert!(!order.stock_reserved);
  assert_eq!(app.stock_of(mug), 1);
}

#[tokio::test]
#[serial]
async fn test_forged_callback_after_deadline_changes_nothing() {
  let app = test_app();
  let user = Uuid::new_v4();
  let mug = app.seed_product("Mug", 19_900, 1);
  app.add_to_cart(user, mug, 1).await;
  let outcome = app.checkout(user, PaymentMethod::Online, None).await.unwrap();

  app.clock.advance(Duration::minutes(16));
  let mut forged = app.confirmation_for(&outcome, "pay_099");
  forged.signature = "0".repeat(64);
  let err = payments::verify(&app.state, user, forged).await.unwrap_err();

  assert!(matches!(err, AppError::InvalidSignature));
  let order = orders::get(&app.state, user, outcome.order.id).await.unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
  assert!(order.stock_reserved);
  assert_eq!(app.stock_of(mug), 0);
}

#[tokio::test]
#[serial]
async fn test_create_intent_for_cod_order_then_pay_online() {
  let app = test_app();
  let user = Uuid::new_v4();
  let lamp = app.seed_product("Lamp", 12_500, 3);
  app.add_to_cart(user, lamp, 1).await;
  let order = app.checkout(user, PaymentMethod::Cod, None).await.unwrap().order;

  let view = payments::create_intent(&app.state, user, order.id).await.unwrap();
  assert!(view.external_order_id.starts_with("mock_order_"));
  assert_eq!(view.amount_minor, 12_500);

  let err = payments::create_intent(&app.state, user, order.id).await.unwrap_err();
  assert!(matches!(err, AppError::IntentAlreadyExists(id) if id == order.id));

  let confirmation = app.confirmation(order.id, &view.external_order_id, "pay_007");
  let paid = payments::verify(&app.state, user, confirmation).await.unwrap();
  assert_eq!(paid.status, OrderStatus::Paid);
}

#[tokio::test]
#[serial]
async fn test_online_checkout_already_has_an_intent() {
  let app = test_app();
  let user = Uuid::new_v4();
  let lamp = app.seed_product("Lamp", 12_500, 3);
  app.add_to_cart(user, lamp, 1).await;
  let outcome = app.checkout(user, PaymentMethod::Online, None).await.unwrap();

  let err = payments::create_intent(&app.state, user, outcome.order.id)
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::IntentAlreadyExists(_)));
}

#[tokio::test]
#[serial]
async fn test_create_intent_on_paid_order_is_conflict() {
  let app = test_app();
  let user = Uuid::new_v4();
  let lamp = app.seed_product("Lamp", 2_500, 3);
  app.add_to_cart(user, lamp, 1).await;
  let order = app.checkout(user, PaymentMethod::Wallet, None).await.unwrap().order;
  payments::pay_with_wallet(&app.state, user, order.id).await.unwrap();

  let err = payments::create_intent(&app.state, user, order.id).await.unwrap_err();
  assert!(matches!(err, AppError::OrderNotPending { .. }));
}

#[tokio::test]
#[serial]
async fn test_coupon_is_consumed_on_payment() {
  let app = test_app();
  let user = Uuid::new_v4();
  let lamp = app.seed_product("Lamp", 25_000, 3);
  app.add_to_cart(user, lamp, 1).await;
  let outcome = app
    .checkout(user, PaymentMethod::Online, Some("FIRSTBUY100"))
    .await
    .unwrap();

  payments::verify(&app.state, user, app.confirmation_for(&outcome, "pay_008"))
    .await
    .unwrap();

  let redemption = app
    .state
    .stores
    .coupons
    .redemption(user, "FIRSTBUY100")
    .await
    .unwrap()
    .unwrap();
  assert!(redemption.consumed_at.is_some());
}
