// kart_server/src/models/order.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Paid,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Paid => "paid",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  /// Forward-only lifecycle.
  pub fn can_advance_to(self, next: OrderStatus) -> bool {
    use OrderStatus::*;
    matches!(
      (self, next),
      (Pending, Paid) | (Pending, Cancelled) | (Paid, Shipped) | (Paid, Cancelled) | (Shipped, Delivered)
    )
  }

  /// Statuses that count towards the cashback cap and coupon eligibility.
  pub fn counts_as_paid(self) -> bool {
    matches!(self, OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered)
  }

  /// Coarse payment state shown to clients.
  pub fn payment_status(self) -> &'static str {
    match self {
      OrderStatus::Pending => "PENDING",
      OrderStatus::Paid | OrderStatus::Shipped | OrderStatus::Delivered => "SUCCESS",
      OrderStatus::Cancelled => "FAILED",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(OrderStatus::Pending),
      "paid" => Ok(OrderStatus::Paid),
      "shipped" => Ok(OrderStatus::Shipped),
      "delivered" => Ok(OrderStatus::Delivered),
      "cancelled" => Ok(OrderStatus::Cancelled),
      other => Err(format!("unknown order status '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
  Cod,
  Online,
  Wallet,
}

impl PaymentMethod {
  pub fn as_str(self) -> &'static str {
    match self {
      PaymentMethod::Cod => "cod",
      PaymentMethod::Online => "online",
      PaymentMethod::Wallet => "wallet",
    }
  }
}

impl FromStr for PaymentMethod {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "cod" => Ok(PaymentMethod::Cod),
      "online" => Ok(PaymentMethod::Online),
      "wallet" => Ok(PaymentMethod::Wallet),
      other => Err(format!("unknown payment method '{}'", other)),
    }
  }
}

/// Price and name are frozen at reservation time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderItem {
  pub product_id: Uuid,
  pub product_name: String,
  pub quantity: i32,
  pub price_at_order_minor: i64,
  pub product_image_url: Option<String>,
}

impl OrderItem {
  pub fn line_total_minor(&self) -> i64 {
    i64::from(self.quantity) * self.price_at_order_minor
  }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShippingAddress {
  pub full_name: String,
  pub phone: String,
  pub pincode: String,
  pub address_line1: String,
  pub address_line2: Option<String>,
  pub landmark: Option<String>,
  pub city: String,
  pub state: String,
  pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
  pub id: Uuid,
  pub user_id: Uuid,
  pub status: OrderStatus,
  pub payment_method: PaymentMethod,
  pub items: Vec<OrderItem>,
  pub shipping_address: ShippingAddress,
  pub total_minor: i64,
  pub discount_minor: i64,
  pub amount_due_minor: i64,
  pub currency: String,
  pub coupon_code: Option<String>,
  pub external_payment_ref: Option<String>,
  pub payment_id: Option<String>,
  pub reservation_expires_at: Option<DateTime<Utc>>,
  /// True while the order still holds the stock it reserved.
  pub stock_reserved: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  pub fn items_total_minor(items: &[OrderItem]) -> i64 {
    items.iter().map(OrderItem::line_total_minor).sum()
  }

  pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
    self.reservation_expires_at.is_some_and(|deadline| deadline <= now)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lifecycle_only_moves_forward() {
    use OrderStatus::*;
    assert!(Pending.can_advance_to(Paid));
    assert!(Pending.can_advance_to(Cancelled));
    assert!(Shipped.can_advance_to(Delivered));
    assert!(!Paid.can_advance_to(Pending));
    assert!(!Cancelled.can_advance_to(Paid));
    assert!(!Delivered.can_advance_to(Shipped));
  }

  #[test]
  fn status_strings_parse_back() {
    for status in [
      OrderStatus::Pending,
      OrderStatus::Paid,
      OrderStatus::Shipped,
      OrderStatus::Delivered,
      OrderStatus::Cancelled,
    ] {
      assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
    }
    assert!("refunded".parse::<OrderStatus>().is_err());
  }

  #[test]
  fn total_is_sum_of_frozen_lines() {
    let items = vec![
      OrderItem {
        product_id: Uuid::new_v4(),
        product_name: "Tea".into(),
        quantity: 3,
        price_at_order_minor: 2_500,
        product_image_url: None,
      },
      OrderItem {
        product_id: Uuid::new_v4(),
        product_name: "Mug".into(),
        quantity: 1,
        price_at_order_minor: 19_900,
        product_image_url: None,
      },
    ];
    assert_eq!(Order::items_total_minor(&items), 27_400);
  }
}
