// src/dag/mod.rs

//! Task graph representation and scheduling.
//!
//! - [`graph`] holds the named, cycle-checked graph of tasks.
//! - [`action`] holds the resolved action each task performs.
//! - [`scheduler`] contains the per-run state machine that decides which
//!   tasks are ready and fails dependents of failed tasks.
//! - [`task_info`] provides per-run status and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod action;
pub mod graph;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use action::TaskAction;
pub use graph::{TaskGraph, TaskNode};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, TaskStatus};
