// marketplace/src/pipeline/mod.rs

//! A small async pipeline of named steps over shared context data.
//!
//! Order placement is expressed as one of these: each step is a handler that
//! reads and writes a [`ContextData`], and steps flagged best-effort may fail
//! without failing the run.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod execution;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use definition::{Handler, Pipeline, PipelineError, StepDef};
