#![allow(dead_code)]

use assetdag::config::model::{
    FilterConfig, InjectTargetConfig, NotifyConfig, StepConfig, TaskConfig, TaskKind,
};
use assetdag::config::{ConfigFile, RawConfigFile};
use assetdag::dag::TaskGraph;
use assetdag::dag::action::{CleanAction, TaskAction};
use assetdag::errors::Result;
use assetdag::types::TriggerWhileRunningBehaviour;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts with `temp = ".tmp/"` and `build = "build/"`.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.paths.insert("temp".into(), ".tmp/".into());
        config.paths.insert("build".into(), "build/".into());
        Self { config }
    }

    pub fn with_path(mut self, name: &str, value: &str) -> Self {
        self.config.paths.insert(name.to_string(), value.to_string());
        self
    }

    pub fn without_path(mut self, name: &str) -> Self {
        self.config.paths.remove(name);
        self
    }

    pub fn with_glob(mut self, name: &str, patterns: &[&str]) -> Self {
        self.config.globs.insert(
            name.to_string(),
            patterns.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn default_task(mut self, name: &str) -> Self {
        self.config.config.default_task = Some(name.to_string());
        self
    }

    pub fn behaviour(mut self, behaviour: TriggerWhileRunningBehaviour) -> Self {
        self.config.config.triggered_while_running_behaviour = behaviour;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn group() -> Self {
        Self {
            task: TaskConfig::default(),
        }
    }

    pub fn transform(src: &[&str], dest: &str) -> Self {
        Self {
            task: TaskConfig {
                kind: TaskKind::Transform,
                src: src.iter().map(|s| s.to_string()).collect(),
                dest: Some(dest.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn clean(patterns: &[&str]) -> Self {
        Self {
            task: TaskConfig {
                kind: TaskKind::Clean,
                patterns: patterns.iter().map(|s| s.to_string()).collect(),
                ..TaskConfig::default()
            },
        }
    }

    pub fn inject(document: &str, dest: &str) -> Self {
        Self {
            task: TaskConfig {
                kind: TaskKind::Inject,
                document: Some(document.to_string()),
                dest: Some(dest.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn optimize(document: &str, dest: &str) -> Self {
        Self {
            task: TaskConfig {
                kind: TaskKind::Optimize,
                document: Some(document.to_string()),
                dest: Some(dest.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn watch(patterns: &[&str], run: &str) -> Self {
        Self {
            task: TaskConfig {
                kind: TaskKind::Watch,
                patterns: patterns.iter().map(|s| s.to_string()).collect(),
                run: Some(run.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.task.after.push(dep.to_string());
        self
    }

    pub fn pipe(mut self, adapter: &str) -> Self {
        self.task.pipe.push(StepConfig::Name(adapter.to_string()));
        self
    }

    pub fn pipe_with(mut self, adapter: &str, options: toml::Table) -> Self {
        self.task.pipe.push(StepConfig::Detailed {
            adapter: adapter.to_string(),
            options,
        });
        self
    }

    pub fn order(mut self, hint: &str) -> Self {
        self.task.order.push(hint.to_string());
        self
    }

    pub fn target(mut self, label: Option<&str>, src: &[&str]) -> Self {
        self.task.targets.push(InjectTargetConfig {
            label: label.map(str::to_string),
            src: src.iter().map(|s| s.to_string()).collect(),
            ..InjectTargetConfig::default()
        });
        self
    }

    pub fn filter(mut self, pattern: &str, adapter: &str) -> Self {
        self.task.filters.push(FilterConfig {
            pattern: pattern.to_string(),
            pipe: vec![StepConfig::Name(adapter.to_string())],
        });
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.task.description = Some(text.to_string());
        self
    }

    pub fn notify(mut self, title: &str) -> Self {
        self.task.notify = Some(NotifyConfig {
            title: title.to_string(),
            subtitle: None,
            message: None,
        });
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Placeholder action for graphs driven by a fake backend.
pub fn fake_action() -> TaskAction {
    TaskAction::Clean(CleanAction {
        patterns: Vec::new(),
    })
}

/// Build a graph from `(name, deps)` pairs; every node gets [`fake_action`].
pub fn graph_of(nodes: &[(&str, &[&str])]) -> TaskGraph {
    try_graph_of(nodes).expect("valid test graph")
}

/// Like [`graph_of`], but names listed in `groups` have no action.
pub fn graph_with_groups(nodes: &[(&str, &[&str])], groups: &[&str]) -> TaskGraph {
    let mut graph = TaskGraph::new();
    for (name, deps) in nodes {
        let action = (!groups.contains(name)).then(fake_action);
        graph
            .register(*name, deps.iter().map(|d| d.to_string()).collect(), action)
            .expect("valid test graph");
    }
    graph.validate().expect("valid test graph");
    graph
}

pub fn try_graph_of(
    nodes: &[(&str, &[&str])],
) -> std::result::Result<TaskGraph, assetdag::errors::ConfigError> {
    let mut graph = TaskGraph::new();
    for (name, deps) in nodes {
        graph.register(
            *name,
            deps.iter().map(|d| d.to_string()).collect(),
            Some(fake_action()),
        )?;
    }
    graph.validate()?;
    Ok(graph)
}
