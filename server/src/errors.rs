// kart_server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use kartflow::FlowError;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Insufficient stock for product {product_id}")]
  InsufficientStock { product_id: Uuid },

  #[error("Cart is empty")]
  EmptyCart,

  #[error("Payment signature verification failed")]
  InvalidSignature,

  #[error("Order {0} has expired")]
  OrderExpired(Uuid),

  #[error("Order {order_id} is {status}, not pending")]
  OrderNotPending { order_id: Uuid, status: String },

  #[error("You can only redeem cashback once per day")]
  AlreadyRedeemedToday,

  #[error("No pending cashback to redeem")]
  NoPendingCashback,

  #[error("Coupon {0} has already been used")]
  CouponAlreadyUsed(String),

  #[error("Coupon is only valid for new users with no previous orders")]
  NotEligibleForCoupon,

  #[error("Invalid coupon code: {0}")]
  InvalidCoupon(String),

  #[error("Insufficient wallet balance")]
  InsufficientBalance,

  #[error("A payment intent already exists for order {0}")]
  IntentAlreadyExists(Uuid),

  #[error("Payment gateway unavailable: {0}")]
  GatewayUnavailable(String),

  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Authentication Failed: {0}")]
  Auth(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Storage Error: {0}")]
  Storage(#[from] StoreError),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: FlowError,
  },

  #[error("Internal Server Error: {0}")]
  Internal(String),
}

impl AppError {
  fn error_code(&self) -> &'static str {
    match self {
      AppError::InsufficientStock { .. } => "insufficient_stock",
      AppError::EmptyCart => "empty_cart",
      AppError::InvalidSignature => "invalid_signature",
      AppError::OrderExpired(_) => "order_expired",
      AppError::OrderNotPending { .. } => "order_not_pending",
      AppError::AlreadyRedeemedToday => "already_redeemed_today",
      AppError::NoPendingCashback => "no_pending_cashback",
      AppError::CouponAlreadyUsed(_) => "coupon_already_used",
      AppError::NotEligibleForCoupon => "not_eligible_for_coupon",
      AppError::InvalidCoupon(_) => "invalid_coupon",
      AppError::InsufficientBalance => "insufficient_balance",
      AppError::IntentAlreadyExists(_) => "intent_already_exists",
      AppError::GatewayUnavailable(_) => "gateway_unavailable",
      AppError::Validation(_) => "validation",
      AppError::Auth(_) => "unauthorized",
      AppError::NotFound(_) => "not_found",
      AppError::Config(_) => "configuration",
      AppError::Storage(_) => "storage",
      AppError::Workflow { .. } => "workflow",
      AppError::Internal(_) => "internal",
    }
  }
}

impl ResponseError for AppError {
  fn status_code(&self) -> StatusCode {
    match self {
      AppError::InsufficientStock { .. }
      | AppError::EmptyCart
      | AppError::InvalidSignature
      | AppError::NoPendingCashback
      | AppError::NotEligibleForCoupon
      | AppError::InvalidCoupon(_)
      | AppError::InsufficientBalance
      | AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::Auth(_) => StatusCode::UNAUTHORIZED,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::OrderExpired(_)
      | AppError::OrderNotPending { .. }
      | AppError::AlreadyRedeemedToday
      | AppError::CouponAlreadyUsed(_)
      | AppError::IntentAlreadyExists(_) => StatusCode::CONFLICT,
      AppError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
      AppError::Config(_) | AppError::Storage(_) | AppError::Workflow { .. } | AppError::Internal(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    // Internal details stay in the log; clients get a fixed message.
    let message = match self {
      AppError::Storage(_) => "Database operation failed".to_string(),
      AppError::Workflow { .. } => "Workflow processing error".to_string(),
      AppError::Config(_) => "Configuration issue".to_string(),
      AppError::Internal(_) => "An internal error occurred".to_string(),
      other => other.to_string(),
    };
    if status.is_server_error() {
      tracing::error!(application_error = %self, "Responding with error");
    } else {
      tracing::info!(application_error = %self, status = status.as_u16(), "Responding with business error");
    }
    HttpResponse::build(status).json(json!({"error": message, "code": self.error_code()}))
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn business_conflicts_map_to_409() {
    assert_eq!(AppError::AlreadyRedeemedToday.status_code(), StatusCode::CONFLICT);
    assert_eq!(
      AppError::CouponAlreadyUsed("WELCOME100".into()).status_code(),
      StatusCode::CONFLICT
    );
    assert_eq!(AppError::OrderExpired(Uuid::nil()).status_code(), StatusCode::CONFLICT);
  }

  #[test]
  fn storage_errors_do_not_leak_details() {
    let err = AppError::Storage(StoreError::Unavailable("connection refused at 10.0.0.7".into()));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    let response = err.error_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn gateway_failure_is_503() {
    assert_eq!(
      AppError::GatewayUnavailable("timeout".into()).status_code(),
      StatusCode::SERVICE_UNAVAILABLE
    );
  }
}
