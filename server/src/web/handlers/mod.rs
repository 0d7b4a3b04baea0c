// kart_server/src/web/handlers/mod.rs

pub mod address_handlers;
pub mod cart_handlers;
pub mod coupon_handlers;
pub mod order_handlers;
pub mod wallet_handlers;
