// src/config/validate.rs

use std::collections::BTreeSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::interpolate::Vars;
use crate::config::model::{ConfigFile, RawConfigFile, TaskKind};
use crate::errors::{AssetdagError, ConfigError, Result};
use crate::pipeline::resolve_action;

/// Task names the CLI claims for itself.
pub const RESERVED_TASK_NAMES: &[&str] = &["help"];

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let cfg = ConfigFile::new_unchecked(raw);
        validate_actions(&cfg)?;
        Ok(cfg)
    }
}

/// Re-run every check on an already constructed config.
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    let raw = RawConfigFile {
        config: cfg.config.clone(),
        paths: cfg.paths.clone(),
        optimized: cfg.optimized.clone(),
        globs: cfg.globs.clone(),
        task: cfg.task.clone(),
    };
    validate_raw_config(&raw)?;
    validate_actions(cfg)
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_task_names(cfg)?;
    validate_paths(cfg)?;
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_default_task(cfg)?;
    validate_watch_targets(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(ConfigError::Invalid(
            "config must contain at least one [task.<name>] section".to_string(),
        )
        .into());
    }
    Ok(())
}

fn validate_task_names(cfg: &RawConfigFile) -> Result<()> {
    if let Some(name) = cfg
        .task
        .keys()
        .find(|name| RESERVED_TASK_NAMES.contains(&name.as_str()))
    {
        return Err(ConfigError::ReservedName(name.clone()).into());
    }
    Ok(())
}

fn validate_paths(cfg: &RawConfigFile) -> Result<()> {
    for key in ["temp", "build"] {
        match cfg.paths.get(key) {
            Some(value) if !value.trim().is_empty() => {}
            _ => return Err(ConfigError::MissingOption(format!("paths.{key}")).into()),
        }
    }
    Ok(())
}

fn validate_task_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if dep == name {
                return Err(ConfigError::Cycle { task: name.clone() }.into());
            }
            if !cfg.task.contains_key(dep) {
                return Err(ConfigError::UnknownDependency {
                    task: name.clone(),
                    dep: dep.clone(),
                }
                .into());
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> task. For
    //   [task.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(ConfigError::Cycle {
            task: cycle.node_id().to_string(),
        }
        .into()),
    }
}

fn validate_default_task(cfg: &RawConfigFile) -> Result<()> {
    if let Some(default) = &cfg.config.default_task {
        if !cfg.task.contains_key(default) && !RESERVED_TASK_NAMES.contains(&default.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "[config].default_task '{default}' is not a defined task"
            ))
            .into());
        }
    }
    Ok(())
}

/// Everything `name` transitively depends on, `name` included.
fn closure<'a>(cfg: &'a RawConfigFile, name: &'a str) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![name];
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        if let Some(task) = cfg.task.get(current) {
            stack.extend(task.after.iter().map(String::as_str));
        }
    }
    seen
}

/// A watch may not re-run a subgraph that contains the watch itself.
fn validate_watch_targets(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter().filter(|(_, t)| t.kind == TaskKind::Watch) {
        let Some(run) = &task.run else {
            continue;
        };
        if closure(cfg, run).contains(name.as_str()) {
            return Err(ConfigError::Cycle { task: name.clone() }.into());
        }
    }
    Ok(())
}

/// Resolve every task once so interpolation and output-directory errors
/// surface at load time.
fn validate_actions(cfg: &ConfigFile) -> Result<()> {
    let vars = Vars::from_config(cfg);
    for (name, task) in cfg.tasks() {
        resolve_action(cfg, &vars, name, task)?;
    }
    Ok(())
}
