// kart_server/src/state.rs

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::db::Stores;
use crate::errors::AppError;
use crate::services::gateway::PaymentGateway;
use kartflow::Flows;
use std::sync::Arc;

/// Everything a request or a flow step needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
  pub stores: Stores,
  pub gateway: Arc<dyn PaymentGateway>,
  pub clock: Arc<dyn Clock>,
  pub config: Arc<AppConfig>,
  pub flows: Arc<Flows<AppError>>,
}
