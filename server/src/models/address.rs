// kart_server/src/models/address.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::order::ShippingAddress;
use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Address {
  pub id: Uuid,
  pub user_id: Uuid,
  pub full_name: String,
  pub phone: String,
  pub pincode: String,
  pub address_line1: String,
  pub address_line2: Option<String>,
  pub landmark: Option<String>,
  pub city: String,
  pub state: String,
  pub country: String,
  pub address_type: String,
  pub is_default: bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Address {
  pub fn to_shipping(&self) -> ShippingAddress {
    ShippingAddress {
      full_name: self.full_name.clone(),
      phone: self.phone.clone(),
      pincode: self.pincode.clone(),
      address_line1: self.address_line1.clone(),
      address_line2: self.address_line2.clone(),
      landmark: self.landmark.clone(),
      city: self.city.clone(),
      state: self.state.clone(),
      country: self.country.clone(),
    }
  }
}

fn default_country() -> String {
  "India".to_string()
}

fn default_address_type() -> String {
  "Home".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressDraft {
  pub full_name: String,
  pub phone: String,
  pub pincode: String,
  pub address_line1: String,
  #[serde(default)]
  pub address_line2: Option<String>,
  #[serde(default)]
  pub landmark: Option<String>,
  pub city: String,
  pub state: String,
  #[serde(default = "default_country")]
  pub country: String,
  #[serde(default = "default_address_type")]
  pub address_type: String,
  #[serde(default)]
  pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AddressPatch {
  pub full_name: Option<String>,
  pub phone: Option<String>,
  pub pincode: Option<String>,
  pub address_line1: Option<String>,
  pub address_line2: Option<String>,
  pub landmark: Option<String>,
  pub city: Option<String>,
  pub state: Option<String>,
  pub country: Option<String>,
  pub address_type: Option<String>,
  pub is_default: Option<bool>,
}

/// How a newly created address interacts with the user's default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
  /// Becomes default only when it is the user's first address.
  IfFirst,
  /// Becomes default, clearing the previous one.
  Always,
}

fn require_digits(field: &str, value: &str, len: usize) -> Result<()> {
  if value.len() != len || !value.chars().all(|c| c.is_ascii_digit()) {
    return Err(AppError::Validation(format!("{} must be exactly {} digits", field, len)));
  }
  Ok(())
}

fn require_text(field: &str, value: &str) -> Result<()> {
  if value.trim().is_empty() {
    return Err(AppError::Validation(format!("{} must not be empty", field)));
  }
  Ok(())
}

fn require_address_type(value: &str) -> Result<()> {
  match value {
    "Home" | "Work" | "Other" => Ok(()),
    other => Err(AppError::Validation(format!(
      "address_type must be Home, Work or Other (got '{}')",
      other
    ))),
  }
}

impl AddressDraft {
  pub fn validate(&self) -> Result<()> {
    require_text("full_name", &self.full_name)?;
    require_digits("phone", &self.phone, 10)?;
    require_digits("pincode", &self.pincode, 6)?;
    require_text("address_line1", &self.address_line1)?;
    require_text("city", &self.city)?;
    require_text("state", &self.state)?;
    require_text("country", &self.country)?;
    require_address_type(&self.address_type)
  }

  pub fn to_shipping(&self) -> ShippingAddress {
    ShippingAddress {
      full_name: self.full_name.clone(),
      phone: self.phone.clone(),
      pincode: self.pincode.clone(),
      address_line1: self.address_line1.clone(),
      address_line2: self.address_line2.clone(),
      landmark: self.landmark.clone(),
      city: self.city.clone(),
      state: self.state.clone(),
      country: self.country.clone(),
    }
  }
}

impl AddressPatch {
  pub fn validate(&self) -> Result<()> {
    if let Some(v) = &self.full_name {
      require_text("full_name", v)?;
    }
    if let Some(v) = &self.phone {
      require_digits("phone", v, 10)?;
    }
    if let Some(v) = &self.pincode {
      require_digits("pincode", v, 6)?;
    }
    if let Some(v) = &self.address_line1 {
      require_text("address_line1", v)?;
    }
    if let Some(v) = &self.city {
      require_text("city", v)?;
    }
    if let Some(v) = &self.state {
      require_text("state", v)?;
    }
    if let Some(v) = &self.address_type {
      require_address_type(v)?;
    }
    Ok(())
  }

  /// Applies the field changes. The default flag is handled by the store.
  pub fn apply_to(&self, address: &mut Address) {
    if let Some(v) = &self.full_name {
      address.full_name = v.clone();
    }
    if let Some(v) = &self.phone {
      address.phone = v.clone();
    }
    if let Some(v) = &self.pincode {
      address.pincode = v.clone();
    }
    if let Some(v) = &self.address_line1 {
      address.address_line1 = v.clone();
    }
    if self.address_line2.is_some() {
      address.address_line2 = self.address_line2.clone();
    }
    if self.landmark.is_some() {
      address.landmark = self.landmark.clone();
    }
    if let Some(v) = &self.city {
      address.city = v.clone();
    }
    if let Some(v) = &self.state {
      address.state = v.clone();
    }
    if let Some(v) = &self.country {
      address.country = v.clone();
    }
    if let Some(v) = &self.address_type {
      address.address_type = v.clone();
    }
  }
}
