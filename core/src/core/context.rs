// kartflow/src/core/context.rs

//! Boxed handler and compensator signatures stored by a [`Flow`](crate::Flow).

use crate::core::context_data::ContextData;
use crate::core::control::FlowControl;
use std::future::Future;
use std::pin::Pin;

/// A step handler.
///
/// Receives a clone of the shared context. Lock guards taken on it must be
/// dropped before the handler awaits anything.
pub type Handler<TData, Err> = Box<
  dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<FlowControl, Err>> + Send>> + Send + Sync,
>;

/// Undo action for a step.
///
/// Runs only after a later (or the same) step failed. It should inspect the
/// context to find out how much of the step actually happened, since the step
/// may have failed halfway through.
pub type Compensator<TData, Err> =
  Box<dyn Fn(ContextData<TData>) -> Pin<Box<dyn Future<Output = Result<(), Err>> + Send>> + Send + Sync>;
