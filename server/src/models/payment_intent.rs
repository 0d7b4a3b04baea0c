// kart_server/src/models/payment_intent.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
  /// Slot claimed, gateway order not yet attached.
  Creating,
  Created,
  Paid,
}

impl IntentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      IntentStatus::Creating => "creating",
      IntentStatus::Created => "created",
      IntentStatus::Paid => "paid",
    }
  }
}

impl FromStr for IntentStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "creating" => Ok(IntentStatus::Creating),
      "created" => Ok(IntentStatus::Created),
      "paid" => Ok(IntentStatus::Paid),
      other => Err(format!("unknown intent status '{}'", other)),
    }
  }
}

/// At most one per order.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
  pub order_id: Uuid,
  pub external_ref: Option<String>,
  pub amount_minor: i64,
  pub currency: String,
  pub status: IntentStatus,
  pub created_at: DateTime<Utc>,
}

/// What the client needs to open the gateway checkout.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntentView {
  pub order_id: Uuid,
  pub external_order_id: String,
  pub amount_minor: i64,
  pub currency: String,
  pub gateway_key_id: String,
}
