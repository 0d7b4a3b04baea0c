// kart_server/src/services/mod.rs

//! Domain operations. Single-statement operations live here directly;
//! multi-step ones build a context and run the matching flow.

pub mod addresses;
pub mod cart;
pub mod coupons;
pub mod gateway;
pub mod orders;
pub mod payments;
pub mod reaper;
pub mod stock;
pub mod wallet;
