// tests/cart_tests.rs
mod common;

use common::*;
use kart_server::errors::AppError;
use kart_server::services::cart;
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn test_adding_twice_merges_and_clamps_to_stock() {
  let app = test_app();
  let user = Uuid::new_v4();
  let tea = app.seed_product("Tea", 2_500, 4);

  let first = cart::add(&app.state, user, tea, 3).await.unwrap();
  let merged = cart::add(&app.state, user, tea, 3).await.unwrap();

  assert_eq!(first.id, merged.id);
  assert_eq!(merged.quantity, 4);
  let view = cart::view(&app.state, user).await.unwrap();
  assert_eq!(view.items.len(), 1);
  assert_eq!(view.total_minor, 10_000);
  assert_eq!(view.item_count, 4);
}

#[tokio::test]
#[serial]
async fn test_add_rejects_bad_input() {
  let app = test_app();
  let user = Uuid::new_v4();
  let tea = app.seed_product("Tea", 2_500, 4);
  let gone = app.seed_product("Gone", 100, 0);

  assert!(matches!(cart::add(&app.state, user, tea, 0).await, Err(AppError::Validation(_))));
  assert!(matches!(
    cart::add(&app.state, user, Uuid::new_v4(), 1).await,
    Err(AppError::NotFound(_))
  ));
  assert!(matches!(
    cart::add(&app.state, user, gone, 1).await,
    Err(AppError::InsufficientStock { .. })
  ));
}

#[tokio::test]
#[serial]
async fn test_view_flags_lines_above_live_stock() {
  let app = test_app();
  let user = Uuid::new_v4();
  let tea = app.seed_product("Tea", 2_500, 4);
  let mug = app.seed_product("Mug", 19_900, 2);
  app.add_to_cart(user, tea, 2).await;
  app.add_to_cart(user, mug, 2).await;
  app.set_product(mug, "Mug", 19_900, 1);

  let view = cart::view(&app.state, user).await.unwrap();
  let mug_line = view.items.iter().find(|l| l.product_id == mug).unwrap();
  assert!(!mug_line.available);
  assert_eq!(view.total_minor, 5_000, "unavailable lines are left out of the total");
}

#[tokio::test]
#[serial]
async fn test_set_quantity_clamps_and_zero_removes() {
  let app = test_app();
  let user = Uuid::new_v4();
  let tea = app.seed_product("Tea", 2_500, 4);
  let line = cart::add(&app.state, user, tea, 1).await.unwrap();

  let updated = cart::set_quantity(&app.state, user, line.id, 10).await.unwrap().unwrap();
  assert_eq!(updated.quantity, 4);

  assert!(cart::set_quantity(&app.state, user, line.id, 0).await.unwrap().is_none());
  assert!(cart::view(&app.state, user).await.unwrap().items.is_empty());

  assert!(matches!(
    cart::set_quantity(&app.state, user, line.id, 1).await,
    Err(AppError::NotFound(_))
  ));
}

#[tokio::test]
#[serial]
async fn test_remove_and_clear() {
  let app = test_app();
  let user = Uuid::new_v4();
  let tea = app.seed_product("Tea", 2_500, 4);
  let mug = app.seed_product("Mug", 19_900, 2);
  let line = cart::add(&app.state, user, tea, 1).await.unwrap();
  app.add_to_cart(user, mug, 1).await;

  assert!(cart::remove(&app.state, user, line.id).await.unwrap());
  assert!(!cart::remove(&app.state, user, line.id).await.unwrap());
  assert_eq!(cart::clear(&app.state, user).await.unwrap(), 1);
}
