// kart_server/src/flows/mod.rs

//! Multi-step operations, each registered as a `kartflow` flow keyed by its
//! context type.

use crate::errors::AppError;
use crate::state::AppState;
use kartflow::Flows;
use std::sync::Arc;

pub mod checkout_flow;
pub mod confirm_flow;
pub mod contexts;
pub mod intent_flow;

/// Called once at startup, after `AppState` is assembled.
pub fn register_all_flows(flows: &Arc<Flows<AppError>>, app_state: &AppState) {
  checkout_flow::register_checkout_flow(flows, app_state);
  intent_flow::register_intent_flow(flows, app_state);
  confirm_flow::register_confirm_flow(flows, app_state);
  tracing::info!(flows = ?flows.flow_names(), "Flows registered.");
}
