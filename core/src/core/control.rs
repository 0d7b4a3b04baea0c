// kartflow/src/core/control.rs

//! Signals for steering a flow and the outcome of a finished run.

/// Returned by handlers to decide whether the flow goes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowControl {
  /// Run the remaining handlers of this step and the steps after it.
  Continue,
  /// Halt the flow. Nothing further runs and no compensation happens:
  /// stopping is a successful outcome, not a failure.
  Stop,
}

/// Outcome of a run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowResult {
  Completed,
  Stopped,
}

impl FlowResult {
  pub fn is_completed(self) -> bool {
    matches!(self, FlowResult::Completed)
  }
}
