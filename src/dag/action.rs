// src/dag/action.rs

//! Resolved task actions.
//!
//! These are built from `TaskConfig` by `pipeline::resolve_action` with all
//! `{var}` and `@glob` references already expanded, so executing an action
//! never consults the raw config again.

use std::path::PathBuf;

use crate::config::model::NotifyConfig;
use crate::engine::TaskName;
use crate::transform::Step;
use crate::types::TriggerWhileRunningBehaviour;

/// What a task does once its dependencies are done. A node without an
/// action is a group.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskAction {
    Transform(TransformAction),
    Clean(CleanAction),
    Inject(InjectAction),
    Optimize(OptimizeAction),
    Watch(WatchAction),
}

impl TaskAction {
    pub fn kind(&self) -> &'static str {
        match self {
            TaskAction::Transform(_) => "transform",
            TaskAction::Clean(_) => "clean",
            TaskAction::Inject(_) => "inject",
            TaskAction::Optimize(_) => "optimize",
            TaskAction::Watch(_) => "watch",
        }
    }
}

/// Read `src`, pipe it through `steps`, write the result under `dest`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformAction {
    pub src: Vec<String>,
    pub order: Vec<String>,
    pub steps: Vec<Step>,
    pub dest: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CleanAction {
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InjectAction {
    pub document: PathBuf,
    /// Directory the rewritten document is written to.
    pub dest: PathBuf,
    pub targets: Vec<InjectTarget>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InjectTarget {
    /// `None` is the default `<!-- inject -->` region.
    pub label: Option<String>,
    pub src: Vec<String>,
    pub order: Vec<String>,
    pub template: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeAction {
    pub document: PathBuf,
    /// Directory receiving the bundles and the rewritten document.
    pub dest: PathBuf,
    /// Directories searched, in order, for each block reference.
    pub search: Vec<PathBuf>,
    pub filters: Vec<BundleFilter>,
}

/// Adapter chain applied to bundles whose target matches `pattern`.
#[derive(Debug, Clone, PartialEq)]
pub struct BundleFilter {
    pub pattern: String,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatchAction {
    pub patterns: Vec<String>,
    /// Task whose dependency closure is re-run on change.
    pub run: TaskName,
    pub use_hash: bool,
    pub debounce_ms: u64,
    pub behaviour: TriggerWhileRunningBehaviour,
}

/// Per-node metadata that is not part of execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskMeta {
    pub description: Option<String>,
    pub notify: Option<NotifyConfig>,
}
