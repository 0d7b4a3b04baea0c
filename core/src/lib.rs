// src/lib.rs

//! kartflow: a small async saga engine.
//!
//! A [`Flow`] is an ordered list of named steps. Each step may carry
//! `before`/`on`/`after` handlers that run against a shared [`ContextData`],
//! an optional skip condition, and any number of compensators.
//!
//! - Handlers return [`FlowControl::Continue`] or [`FlowControl::Stop`].
//! - When a handler fails, the compensators of every step that was entered
//!   (the failing one included) run in reverse order, and the original error
//!   is returned to the caller.
//! - A [`Flows`] registry keys flows by their context data type so that
//!   application code can dispatch a run from nothing but a context value.

pub mod core;
pub mod error;
pub mod flow;
pub mod registry;

pub use crate::core::context::{Compensator, Handler};
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{FlowControl, FlowResult};
pub use crate::core::step::{SkipCondition, StepDef};

pub use crate::flow::definition::Flow;

pub use crate::error::FlowError;

pub use crate::registry::Flows;
