// tests/failure_injection_tests.rs
mod common;

use common::*;
use kart_server::errors::AppError;
use kart_server::models::{IntentStatus, OrderStatus, PaymentMethod};
use kart_server::services::{cart, coupons, orders, payments, wallet};
use serial_test::serial;
use std::time::Duration;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_gateway_down_during_checkout_leaves_nothing_behind() {
  let app = test_app();
  let user = Uuid::new_v4();
  let lamp = app.seed_product("Lamp", 25_000, 2);
  app.add_to_cart(user, lamp, 2).await;
  app.gateway.set_unavailable(true);

  let err = app
    .checkout(user, PaymentMethod::Online, Some("NEWUSER100"))
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::GatewayUnavailable(_)));
  assert_eq!(app.stock_of(lamp), 2);
  assert!(app
    .state
    .stores
    .coupons
    .redemption(user, "NEWUSER100")
    .await
    .unwrap()
    .is_none());
  let listed = coupons::list(&app.state, user).await.unwrap();
  assert!(listed.iter().all(|c| !c.is_used));
  assert!(orders::list(&app.state, user).await.unwrap().is_empty());
  assert_eq!(cart::view(&app.state, user).await.unwrap().items.len(), 1);

  // The coupon was never really applied, so the user can still apply it.
  let applied = coupons::apply(&app.state, user, "newuser100").await.unwrap();
  assert_eq!(applied.code, "NEWUSER100");

  // Retrying once the gateway is back picks the applied coupon up.
  app.gateway.set_unavailable(false);
  let outcome = app
    .checkout(user, PaymentMethod::Online, Some("NEWUSER100"))
    .await
    .unwrap();
  assert_eq!(outcome.order.discount_minor, 10_000);
}

#[tokio::test]
#[serial]
async fn test_rollback_keeps_a_coupon_applied_before_checkout() {
  let app = test_app();
  let user = Uuid::new_v4();
  let lamp = app.seed_product("Lamp", 25_000, 2);
  app.add_to_cart(user, lamp, 1).await;
  coupons::apply(&app.state, user, "SAVE100").await.unwrap();
  app.gateway.set_unavailable(true);

  let err = app
    .checkout(user, PaymentMethod::Online, Some("SAVE100"))
    .await
    .unwrap_err();

  assert!(matches!(err, AppError::GatewayUnavailable(_)));
  let redemption = app
    .state
    .stores
    .coupons
    .redemption(user, "SAVE100")
    .await
    .unwrap()
    .unwrap();
  assert!(redemption.order_id.is_none());
  assert!(redemption.consumed_at.is_none());
  let err = coupons::apply(&app.state, user, "SAVE100").await.unwrap_err();
  assert!(matches!(err, AppError::CouponAlreadyUsed(_)));
}

#[tokio::test]
#[serial]
async fn test_slow_gateway_times_out_as_unavailable() {
  let app = test_app();
  let user = Uuid::new_v4();
  let lamp = app.seed_product("Lamp", 25_000, 2);
  app.add_to_cart(user, lamp, 1).await;
  app.gateway.set_latency(Duration::from_millis(500));

  let err = app.checkout(user, PaymentMethod::Online, None).await.unwrap_err();

  assert!(matches!(err, AppError::GatewayUnavailable(_)));
  assert_eq!(app.stock_of(lamp), 2);
}

#[tokio::test]
#[serial]
async fn test_order_insert_failure_releases_reservations() {
  let app = test_app();
  let user = Uuid::new_v4();
  let tea = app.seed_product("Tea", 2_500, 5);
  let mug = app.seed_product("Mug", 19_900, 2);
  app.add_to_cart(user, tea, 3).await;
  app.add_to_cart(user, mug, 1).await;
  app.backend.faults.fail_next("orders.insert", 1);

  let err = app.checkout(user, PaymentMethod::Cod, None).await.unwrap_err();

  assert!(matches!(err, AppError::Storage(_)));
  assert_eq!(app.stock_of(tea), 5);
  assert_eq!(app.stock_of(mug), 2);
}

#[tokio::test]
#[serial]
async fn test_cart_clear_failure_does_not_fail_checkout() {
  let app = test_app();
  let user = Uuid::new_v4();
  let tea = app.seed_product("Tea", 2_500, 5);
  app.add_to_cart(user, tea, 1).await;
  app.backend.faults.fail_next("cart.clear", 1);

  let outcome = app.checkout(user, PaymentMethod::Cod, None).await.unwrap();

  assert_eq!(outcome.order.status, OrderStatus::Pending);
  assert_eq!(app.stock_of(tea), 4);
}

#[tokio::test]
#[serial]
async fn test_store_failure_after_paid_flip_rolls_everything_back() {
  let app = test_app();
  let user = Uuid::new_v4();
  let lamp = app.seed_product("Lamp", 25_000, 2);
  app.add_to_cart(user, lamp, 1).await;
  let outcome = app
    .checkout(user, PaymentMethod::Online, Some("WELCOME100"))
    .await
    .unwrap();
  let confirmation = app.confirmation_for(&outcome, "pay_101");
  let before = wallet::account(&app.state, user).await.unwrap();
  app.backend.faults.fail_next("orders.settle_intent", 1);

  let err = payments::verify(&app.state, user, confirmation.clone()).await.unwrap_err();

  assert!(matches!(err, AppError::Storage(_)));
  let order = orders::get(&app.state, user, outcome.order.id).await.unwrap();
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(wallet::account(&app.state, user).await.unwrap(), before);
  let redemption = app
    .state
    .stores
    .coupons
    .redemption(user, "WELCOME100")
    .await
    .unwrap()
    .unwrap();
  assert!(redemption.consumed_at.is_none());
  assert_eq!(redemption.order_id, Some(order.id), "hold survives for the retry");

  // The client retries the same callback and it goes through.
  let paid = payments::verify(&app.state, user, confirmation).await.unwrap();
  assert_eq!(paid.status, OrderStatus::Paid);
  let intent = app.state.stores.orders.intent(paid.id).await.unwrap().unwrap();
  assert_eq!(intent.status, IntentStatus::Paid);
}

#[tokio::test]
#[serial]
async fn test_wallet_debit_refunded_when_paid_flip_fails() {
  let app = test_app();
  let user = Uuid::new_v4();
  let cup = app.seed_product("Cup", 3_000, 2);
  app.add_to_cart(user, cup, 1).await;
  let order = app.checkout(user, PaymentMethod::Wallet, None).await.unwrap().order;
  app.backend.faults.fail_next("orders.mark_paid", 1);

  let err = payments::pay_with_wallet(&app.state, user, order.id).await.unwrap_err();

  assert!(matches!(err, AppError::Storage(_)));
  assert_eq!(wallet::account(&app.state, user).await.unwrap().balance_minor, 10_000);
  assert_eq!(
    orders::get(&app.state, user, order.id).await.unwrap().status,
    OrderStatus::Pending
  );
}

#[tokio::test]
#[serial]
async fn test_gateway_down_during_create_intent_frees_the_slot() {
  let app = test_app();
  let user = Uuid::new_v4();
  let lamp = app.seed_product("Lamp", 12_500, 2);
  app.add_to_cart(user, lamp, 1).await;
  let order = app.checkout(user, PaymentMethod::Cod, None).await.unwrap().order;

  app.gateway.set_unavailable(true);
  let err = payments::create_intent(&app.state, user, order.id).await.unwrap_err();
  assert!(matches!(err, AppError::GatewayUnavailable(_)));
  assert!(app.state.stores.orders.intent(order.id).await.unwrap().is_none());

  app.gateway.set_unavailable(false);
  let view = payments::create_intent(&app.state, user, order.id).await.unwrap();
  assert_eq!(view.order_id, order.id);
}
