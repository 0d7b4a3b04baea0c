// kart_server/src/models/mod.rs

//! Records persisted by the stores and the views built from them.

pub mod address;
pub mod cart_item;
pub mod coupon;
pub mod order;
pub mod payment_intent;
pub mod product;
pub mod wallet;

pub use address::{Address, AddressDraft, AddressPatch, DefaultPolicy};
pub use cart_item::{CartItem, CartLineView, CartView};
pub use coupon::{AppliedCoupon, Coupon, CouponListing, CouponRedemption};
pub use order::{Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};
pub use payment_intent::{IntentStatus, PaymentIntent, PaymentIntentView};
pub use product::{Product, Reservation};
pub use wallet::{Redemption, WalletAccount, WalletOpening};
