// kart_server/src/config.rs

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
  Postgres,
  Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayKind {
  Mock,
  Razorpay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,

  pub storage_backend: StorageBackend,
  /// Relational ledger: wallet accounts.
  pub ledger_database_url: Option<String>,
  /// Document store: catalog, carts, orders, addresses, coupons.
  pub catalog_database_url: Option<String>,
  pub db_max_connections: u32,

  pub gateway: GatewayKind,
  pub razorpay_key_id: String,
  pub razorpay_key_secret: String,
  pub razorpay_base_url: String,
  pub mock_gateway_secret: String,
  pub gateway_timeout: Duration,

  pub currency: String,
  pub min_payment_amount_minor: i64,

  pub reservation_ttl: Duration,
  pub reaper_interval: Duration,
  pub reaper_batch_size: i64,

  pub cashback_amount_minor: i64,
  pub cashback_order_cap: i64,
  pub wallet_opening_balance_minor: i64,
  pub wallet_opening_cashback_minor: i64,

  pub log_format: LogFormat,
}

impl Default for AppConfig {
  /// Local defaults: in-memory stores and the mock gateway.
  fn default() -> Self {
    Self {
      server_host: "127.0.0.1".to_string(),
      server_port: 8080,
      storage_backend: StorageBackend::Memory,
      ledger_database_url: None,
      catalog_database_url: None,
      db_max_connections: 10,
      gateway: GatewayKind::Mock,
      razorpay_key_id: String::new(),
      razorpay_key_secret: String::new(),
      razorpay_base_url: "https://api.razorpay.com".to_string(),
      mock_gateway_secret: "mock_gateway_secret".to_string(),
      gateway_timeout: Duration::from_millis(5_000),
      currency: "INR".to_string(),
      min_payment_amount_minor: 100,
      reservation_ttl: Duration::from_secs(15 * 60),
      reaper_interval: Duration::from_secs(30),
      reaper_batch_size: 100,
      cashback_amount_minor: 5_000,
      cashback_order_cap: 3,
      wallet_opening_balance_minor: 10_000,
      wallet_opening_cashback_minor: 5_000,
      log_format: LogFormat::Pretty,
    }
  }
}

fn parse_var<T>(name: &str, raw: &str) -> Result<T>
where
  T: FromStr,
  T::Err: std::fmt::Display,
{
  raw
    .trim()
    .parse::<T>()
    .map_err(|e| AppError::Config(format!("Invalid {}: {}", name, e)))
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    Self::from_lookup(|name| env::var(name).ok())
  }

  /// Builds a config from an arbitrary variable source. Unset variables keep
  /// their defaults.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let mut cfg = Self::default();

    let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = var("SERVER_HOST") {
      cfg.server_host = v;
    }
    if let Some(v) = var("SERVER_PORT") {
      cfg.server_port = parse_var("SERVER_PORT", &v)?;
    }
    if let Some(v) = var("STORAGE_BACKEND") {
      cfg.storage_backend = match v.to_ascii_lowercase().as_str() {
        "postgres" => StorageBackend::Postgres,
        "memory" => StorageBackend::Memory,
        other => return Err(AppError::Config(format!("Unknown STORAGE_BACKEND '{}'", other))),
      };
    }
    cfg.ledger_database_url = var("LEDGER_DATABASE_URL").or_else(|| var("DATABASE_URL"));
    cfg.catalog_database_url = var("CATALOG_DATABASE_URL").or_else(|| var("DATABASE_URL"));
    if let Some(v) = var("DB_MAX_CONNECTIONS") {
      cfg.db_max_connections = parse_var("DB_MAX_CONNECTIONS", &v)?;
    }

    if let Some(v) = var("PAYMENT_GATEWAY") {
      cfg.gateway = match v.to_ascii_lowercase().as_str() {
        "mock" => GatewayKind::Mock,
        "razorpay" => GatewayKind::Razorpay,
        other => return Err(AppError::Config(format!("Unknown PAYMENT_GATEWAY '{}'", other))),
      };
    }
    if let Some(v) = var("RAZORPAY_KEY_ID") {
      cfg.razorpay_key_id = v;
    }
    if let Some(v) = var("RAZORPAY_KEY_SECRET") {
      cfg.razorpay_key_secret = v;
    }
    if let Some(v) = var("RAZORPAY_BASE_URL") {
      cfg.razorpay_base_url = v.trim_end_matches('/').to_string();
    }
    if let Some(v) = var("MOCK_GATEWAY_SECRET") {
      cfg.mock_gateway_secret = v;
    }
    if let Some(v) = var("GATEWAY_TIMEOUT_MS") {
      cfg.gateway_timeout = Duration::from_millis(parse_var("GATEWAY_TIMEOUT_MS", &v)?);
    }

    if let Some(v) = var("CURRENCY") {
      cfg.currency = v.to_ascii_uppercase();
    }
    if let Some(v) = var("MIN_PAYMENT_AMOUNT_MINOR") {
      cfg.min_payment_amount_minor = parse_var("MIN_PAYMENT_AMOUNT_MINOR", &v)?;
    }
    if let Some(v) = var("RESERVATION_TTL_SECS") {
      cfg.reservation_ttl = Duration::from_secs(parse_var("RESERVATION_TTL_SECS", &v)?);
    }
    if let Some(v) = var("REAPER_INTERVAL_SECS") {
      cfg.reaper_interval = Duration::from_secs(parse_var("REAPER_INTERVAL_SECS", &v)?);
    }
    if let Some(v) = var("REAPER_BATCH_SIZE") {
      cfg.reaper_batch_size = parse_var("REAPER_BATCH_SIZE", &v)?;
    }
    if let Some(v) = var("CASHBACK_AMOUNT_MINOR") {
      cfg.cashback_amount_minor = parse_var("CASHBACK_AMOUNT_MINOR", &v)?;
    }
    if let Some(v) = var("CASHBACK_ORDER_CAP") {
      cfg.cashback_order_cap = parse_var("CASHBACK_ORDER_CAP", &v)?;
    }
    if let Some(v) = var("WALLET_OPENING_BALANCE_MINOR") {
      cfg.wallet_opening_balance_minor = parse_var("WALLET_OPENING_BALANCE_MINOR", &v)?;
    }
    if let Some(v) = var("WALLET_OPENING_CASHBACK_MINOR") {
      cfg.wallet_opening_cashback_minor = parse_var("WALLET_OPENING_CASHBACK_MINOR", &v)?;
    }
    if let Some(v) = var("LOG_FORMAT") {
      cfg.log_format = match v.to_ascii_lowercase().as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Pretty,
      };
    }

    cfg.validate()?;
    tracing::info!(
      storage = ?cfg.storage_backend,
      gateway = ?cfg.gateway,
      reservation_ttl_secs = cfg.reservation_ttl.as_secs(),
      "Application configuration loaded."
    );
    Ok(cfg)
  }

  /// Deadline for an unpaid order's stock reservation taken at `now`.
  pub fn reservation_deadline(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let ttl = chrono::Duration::from_std(self.reservation_ttl)
      .map_err(|e| AppError::Config(format!("reservation TTL out of range: {}", e)))?;
    Ok(now + ttl)
  }

  fn validate(&self) -> Result<()> {
    if self.storage_backend == StorageBackend::Postgres
      && (self.ledger_database_url.is_none() || self.catalog_database_url.is_none())
    {
      return Err(AppError::Config(
        "STORAGE_BACKEND=postgres requires LEDGER_DATABASE_URL and CATALOG_DATABASE_URL (or DATABASE_URL)".to_string(),
      ));
    }
    if self.gateway == GatewayKind::Razorpay && (self.razorpay_key_id.is_empty() || self.razorpay_key_secret.is_empty()) {
      return Err(AppError::Config(
        "PAYMENT_GATEWAY=razorpay requires RAZORPAY_KEY_ID and RAZORPAY_KEY_SECRET".to_string(),
      ));
    }
    if self.reservation_ttl.is_zero() {
      return Err(AppError::Config("RESERVATION_TTL_SECS must be positive".to_string()));
    }
    if self.reaper_interval.is_zero() {
      return Err(AppError::Config("REAPER_INTERVAL_SECS must be positive".to_string()));
    }
    if self.cashback_amount_minor < 0 || self.min_payment_amount_minor < 0 {
      return Err(AppError::Config("Money settings must not be negative".to_string()));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn from_map(pairs: &[(&str, &str)]) -> Result<AppConfig> {
    let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    AppConfig::from_lookup(|name| map.get(name).cloned())
  }

  #[test]
  fn empty_environment_gives_local_defaults() {
    let cfg = from_map(&[]).unwrap();
    assert_eq!(cfg.storage_backend, StorageBackend::Memory);
    assert_eq!(cfg.gateway, GatewayKind::Mock);
    assert_eq!(cfg.reservation_ttl, Duration::from_secs(900));
    assert_eq!(cfg.cashback_order_cap, 3);
  }

  #[test]
  fn database_url_feeds_both_pools() {
    let cfg = from_map(&[("STORAGE_BACKEND", "postgres"), ("DATABASE_URL", "postgres://localhost/kart")]).unwrap();
    assert_eq!(cfg.ledger_database_url.as_deref(), Some("postgres://localhost/kart"));
    assert_eq!(cfg.catalog_database_url.as_deref(), Some("postgres://localhost/kart"));
  }

  #[test]
  fn postgres_without_urls_is_rejected() {
    let err = from_map(&[("STORAGE_BACKEND", "postgres")]).unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
  }

  #[test]
  fn razorpay_requires_keys() {
    assert!(from_map(&[("PAYMENT_GATEWAY", "razorpay")]).is_err());
    let cfg = from_map(&[
      ("PAYMENT_GATEWAY", "razorpay"),
      ("RAZORPAY_KEY_ID", "rzp_test_x"),
      ("RAZORPAY_KEY_SECRET", "s3cret"),
    ])
    .unwrap();
    assert_eq!(cfg.gateway, GatewayKind::Razorpay);
  }

  #[test]
  fn bad_numbers_are_config_errors() {
    let err = from_map(&[("SERVER_PORT", "eighty")]).unwrap_err();
    assert!(err.to_string().contains("SERVER_PORT"));
    assert!(from_map(&[("RESERVATION_TTL_SECS", "0")]).is_err());
  }
}
