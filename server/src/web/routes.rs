// kart_server/src/web/routes.rs

use actix_web::{web, HttpResponse};

use crate::web::handlers::{address_handlers, cart_handlers, coupon_handlers, order_handlers, wallet_handlers};

async fn health_check_handler() -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// Mounts every route under `/api/v1`. Called from `main.rs` and from the
/// HTTP tests.
pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/cart")
          .route("", web::get().to(cart_handlers::view_cart_handler))
          .route("", web::post().to(cart_handlers::add_to_cart_handler))
          .route("/{item_id}", web::patch().to(cart_handlers::set_quantity_handler))
          .route("/{item_id}", web::delete().to(cart_handlers::remove_item_handler)),
      )
      .service(
        web::scope("/orders")
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("", web::post().to(order_handlers::place_order_handler))
          // Literal segments go before `/{order_id}`.
          .route("/create-payment", web::post().to(order_handlers::create_payment_handler))
          .route("/verify-payment", web::post().to(order_handlers::verify_payment_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/cancel", web::post().to(order_handlers::cancel_order_handler)),
      )
      .service(
        web::scope("/wallet")
          .route("", web::get().to(wallet_handlers::get_wallet_handler))
          .route("/redeem", web::post().to(wallet_handlers::redeem_cashback_handler))
          .route("/pay", web::post().to(wallet_handlers::wallet_pay_handler)),
      )
      .service(
        web::scope("/payments")
          .route("/coupon/apply", web::post().to(coupon_handlers::apply_coupon_handler))
          .route("/coupons", web::get().to(coupon_handlers::list_coupons_handler)),
      )
      .service(
        web::scope("/addresses")
          .route("", web::get().to(address_handlers::list_addresses_handler))
          .route("", web::post().to(address_handlers::create_address_handler))
          .route("/{address_id}", web::patch().to(address_handlers::update_address_handler))
          .route("/{address_id}", web::delete().to(address_handlers::delete_address_handler))
          .route("/{address_id}/default", web::post().to(address_handlers::set_default_address_handler)),
      ),
  );
}
