// src/dag/task_info.rs

//! Task metadata and per-run state.

use crate::engine::TaskName;

/// Per-run state of a task (internal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Part of this run, waiting on dependencies.
    Pending,
    /// Action dispatched and not yet finished.
    Running,
    Done,
    /// The action failed, or an upstream dependency did.
    Failed,
}

/// Public, read-only view of a task's per-run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Outside the dependency closure of the current run's target.
    NotInRun,
    Pending,
    Running,
    Done,
    Failed,
}

impl From<Option<RunState>> for TaskStatus {
    fn from(state: Option<RunState>) -> Self {
        match state {
            None => TaskStatus::NotInRun,
            Some(RunState::Pending) => TaskStatus::Pending,
            Some(RunState::Running) => TaskStatus::Running,
            Some(RunState::Done) => TaskStatus::Done,
            Some(RunState::Failed) => TaskStatus::Failed,
        }
    }
}

/// Scheduler-side view of a node.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: TaskName,
    /// Direct dependencies (names in `after = [...]`).
    pub deps: Vec<TaskName>,
    pub run_state: Option<RunState>,
}

impl TaskInfo {
    pub fn new(name: TaskName, deps: Vec<TaskName>) -> Self {
        Self {
            name,
            deps,
            run_state: None,
        }
    }
}

/// A task the scheduler wants started now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    pub name: TaskName,
    /// All tasks of one run share the same `run_id`.
    pub run_id: u64,
}
