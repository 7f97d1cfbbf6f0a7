// src/exec/mod.rs

//! Action execution layer.
//!
//! - [`backend`] provides the [`ActionBackend`] trait and the production
//!   [`PipelineBackend`], which tests replace with a fake.
//! - [`task_runner`] runs transform actions.

pub mod backend;
pub mod task_runner;

pub use backend::{ActionBackend, PipelineBackend, PipelineContext};
pub(crate) use backend::run_blocking;
pub use task_runner::run_transform;
