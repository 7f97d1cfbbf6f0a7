// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::TriggerWhileRunningBehaviour;

/// Top-level configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// default_task = "build"
///
/// [paths]
/// client = "src/client/"
/// temp = ".tmp/"
/// build = "build/"
///
/// [globs]
/// ts = ["{client}app/**/*.ts"]
///
/// [task.compile-scripts]
/// kind = "transform"
/// src = ["@ts"]
/// pipe = ["typescript"]
/// dest = "{temp}"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Global behaviour config from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// String variables usable as `{name}` anywhere a path or pattern is
    /// expected. `temp` and `build` are required.
    #[serde(default)]
    pub paths: BTreeMap<String, String>,

    /// Optimized bundle file names, usable as `{optimized.app}` / `{optimized.lib}`.
    #[serde(default)]
    pub optimized: OptimizedSection,

    /// Named pattern lists usable as `"@name"` entries of a pattern list.
    #[serde(default)]
    pub globs: BTreeMap<String, Vec<String>>,

    /// All tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated configuration. Immutable once loaded; shared by every task.
///
/// Construct through `ConfigFile::try_from(RawConfigFile)` (see
/// `config::validate`) or [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub paths: BTreeMap<String, String>,
    pub optimized: OptimizedSection,
    pub globs: BTreeMap<String, Vec<String>>,
    pub task: BTreeMap<String, TaskConfig>,
}

impl ConfigFile {
    /// Wrap a raw config without running validation. Only `validate` should
    /// call this.
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            paths: raw.paths,
            optimized: raw.optimized,
            globs: raw.globs,
            task: raw.task,
        }
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn temp_dir(&self) -> &str {
        self.paths.get("temp").map(String::as_str).unwrap_or_default()
    }

    pub fn build_dir(&self) -> &str {
        self.paths.get("build").map(String::as_str).unwrap_or_default()
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Task run when the CLI is invoked without a task name.
    #[serde(default)]
    pub default_task: Option<String>,

    /// Window during which file change events are coalesced into one trigger.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    #[serde(default)]
    pub triggered_while_running_behaviour: TriggerWhileRunningBehaviour,

    /// Whether tasks with a `notify` table emit an OS notification.
    #[serde(default = "default_notifications")]
    pub notifications: bool,
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_notifications() -> bool {
    true
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default_task: None,
            debounce_ms: default_debounce_ms(),
            triggered_while_running_behaviour: TriggerWhileRunningBehaviour::default(),
            notifications: default_notifications(),
        }
    }
}

/// `[optimized]` section: file names of the first-party and third-party bundles.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct OptimizedSection {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub lib: Option<String>,
}

/// What a task does when all of its dependencies are done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    /// No action; a pure synchronization point.
    #[default]
    Group,
    Transform,
    Clean,
    Inject,
    Optimize,
    Watch,
}

/// `[task.<name>]` section.
///
/// Fields are shared between kinds; `config::validate` checks that each kind
/// has what it needs and nothing it would silently ignore.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub kind: TaskKind,

    /// Dependency list: this task waits for all tasks listed here.
    #[serde(default)]
    pub after: Vec<String>,

    /// Input patterns (`transform`).
    #[serde(default)]
    pub src: Vec<String>,

    /// Ordering hints applied to the resolved inputs (`transform`).
    #[serde(default)]
    pub order: Vec<String>,

    /// Adapter chain (`transform`).
    #[serde(default)]
    pub pipe: Vec<StepConfig>,

    /// Output directory (`transform`, `inject`, `optimize`).
    #[serde(default)]
    pub dest: Option<String>,

    /// Paths to delete (`clean`) or to monitor (`watch`).
    #[serde(default)]
    pub patterns: Vec<String>,

    /// HTML document to rewrite (`inject`, `optimize`).
    #[serde(default)]
    pub document: Option<String>,

    /// Injection regions to fill (`inject`).
    #[serde(default)]
    pub targets: Vec<InjectTargetConfig>,

    /// Directories searched for assets referenced by build blocks (`optimize`).
    #[serde(default)]
    pub search: Vec<String>,

    /// Per-bundle adapter chains (`optimize`).
    #[serde(default)]
    pub filters: Vec<FilterConfig>,

    /// Task whose subgraph is run on change (`watch`).
    #[serde(default)]
    pub run: Option<String>,

    /// Skip triggers when watched content is unchanged (`watch`).
    #[serde(default)]
    pub use_hash: Option<bool>,

    /// Per-watch override of `[config].debounce_ms`.
    #[serde(default)]
    pub debounce_ms: Option<u64>,

    /// Notification emitted after this task succeeds as the top-level target.
    #[serde(default)]
    pub notify: Option<NotifyConfig>,
}

/// One adapter in a `pipe` list: either a bare adapter name or a table
/// `{ use = "sass", style = "compressed" }`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StepConfig {
    Name(String),
    Detailed {
        #[serde(rename = "use")]
        adapter: String,
        #[serde(flatten)]
        options: toml::Table,
    },
}

impl StepConfig {
    pub fn adapter(&self) -> &str {
        match self {
            StepConfig::Name(name) => name,
            StepConfig::Detailed { adapter, .. } => adapter,
        }
    }

    pub fn options(&self) -> toml::Table {
        match self {
            StepConfig::Name(_) => toml::Table::new(),
            StepConfig::Detailed { options, .. } => options.clone(),
        }
    }
}

/// `[[task.<name>.targets]]` entry of an inject task.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct InjectTargetConfig {
    /// Region label; `None` selects the default `<!-- inject -->` region.
    #[serde(default)]
    pub label: Option<String>,
    pub src: Vec<String>,
    #[serde(default)]
    pub order: Vec<String>,
    /// Reference line template with a `{path}` placeholder.
    #[serde(default)]
    pub template: Option<String>,
}

/// `[[task.<name>.filters]]` entry of an optimize task.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilterConfig {
    /// Glob matched against the bundle target path.
    pub pattern: String,
    pub pipe: Vec<StepConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct NotifyConfig {
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
