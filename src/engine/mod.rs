// src/engine/mod.rs

//! Orchestration engine.
//!
//! - [`runner`] drives the pure [`crate::dag::Scheduler`] for one run,
//!   executing ready actions concurrently through an
//!   [`crate::exec::ActionBackend`].
//! - [`watch_loop`] re-runs a target on triggers, with cancel/queue
//!   semantics for triggers that arrive mid-run.
//! - [`watch_hub`] keeps a single watch loop per target so watchers of the
//!   same target never start overlapping runs.

use std::collections::BTreeMap;

use crate::dag::TaskStatus;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Outcome of a task's action, as fed to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed,
}

/// Summary of one run of a target's dependency closure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub target: TaskName,
    pub run_id: u64,
    /// Tasks in the order they were started.
    pub started: Vec<TaskName>,
    /// Tasks in the order they completed successfully.
    pub completed: Vec<TaskName>,
    /// Failed tasks: those whose action failed, then dependents that were
    /// never started because of them.
    pub failed: Vec<TaskName>,
    /// Error message per task whose action failed.
    pub errors: BTreeMap<TaskName, String>,
    pub statuses: BTreeMap<TaskName, TaskStatus>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        !self.cancelled && self.failed.is_empty()
    }

    pub fn status_of(&self, task: &str) -> TaskStatus {
        self.statuses
            .get(task)
            .copied()
            .unwrap_or(TaskStatus::NotInRun)
    }
}

pub mod runner;
pub mod watch_hub;
pub mod watch_loop;

pub use crate::types::TriggerWhileRunningBehaviour;
pub use runner::{CancelHandle, Runner};
pub use watch_hub::WatchHub;
pub use watch_loop::{WatchLoop, WatchSummary};
