// kartflow/src/core/mod.rs

//! Building blocks shared by flow definitions and the registry.

pub mod context;
pub mod context_data;
pub mod control;
pub mod step;

pub use context_data::ContextData;
