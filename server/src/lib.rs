// kart_server/src/lib.rs

//! Storefront order service: carts, checkout with stock reservation, online
//! and wallet payments, cashback and coupons.

pub mod clock;
pub mod config;
pub mod db;
pub mod errors;
pub mod flows;
pub mod models;
pub mod services;
pub mod state;
pub mod web;
