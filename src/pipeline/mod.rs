// src/pipeline/mod.rs

//! Turns a validated [`ConfigFile`] into an executable [`TaskGraph`].
//!
//! Every `{var}` and `@glob` reference is expanded here, once, so actions
//! never consult the raw config again.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::interpolate::Vars;
use crate::config::model::{ConfigFile, StepConfig, TaskConfig, TaskKind};
use crate::dag::TaskGraph;
use crate::dag::action::{
    BundleFilter, CleanAction, InjectAction, InjectTarget, OptimizeAction, TaskAction, TaskMeta,
    TransformAction, WatchAction,
};
use crate::errors::ConfigError;
use crate::fs::path_utils::{is_within, normalize_lexically};
use crate::glob::{glob_base, has_magic};
use crate::transform::{AdapterRegistry, Step, StepOptions};

type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// The directories generated output may be written to.
#[derive(Debug, Clone)]
struct OutputDirs {
    temp: PathBuf,
    build: PathBuf,
}

impl OutputDirs {
    fn new(vars: &Vars) -> ConfigResult<Self> {
        Ok(Self {
            temp: normalize_lexically(Path::new(&vars.expand("{temp}")?)),
            build: normalize_lexically(Path::new(&vars.expand("{build}")?)),
        })
    }

    fn check(&self, task: &str, field: &str, path: &Path) -> ConfigResult<()> {
        if is_within(&self.temp, path) || is_within(&self.build, path) {
            return Ok(());
        }
        Err(ConfigError::Invalid(format!(
            "task '{task}': {field} '{}' is outside the temp ('{}') and build ('{}') directories",
            path.display(),
            self.temp.display(),
            self.build.display()
        )))
    }
}

fn required<'a, T>(value: Option<&'a T>, task: &str, field: &str) -> ConfigResult<&'a T>
where
    T: ?Sized,
{
    value.ok_or_else(|| ConfigError::MissingOption(format!("task.{task}.{field}")))
}

fn required_list<'a>(list: &'a [String], task: &str, field: &str) -> ConfigResult<&'a [String]> {
    if list.is_empty() {
        return Err(ConfigError::MissingOption(format!("task.{task}.{field}")));
    }
    Ok(list)
}

/// Reject fields that the task's kind would silently ignore.
fn reject_unused(name: &str, kind: TaskKind, task: &TaskConfig) -> ConfigResult<()> {
    use TaskKind::*;
    let fields: [(&str, bool, &[TaskKind]); 11] = [
        ("src", !task.src.is_empty(), &[Transform]),
        ("order", !task.order.is_empty(), &[Transform]),
        ("pipe", !task.pipe.is_empty(), &[Transform]),
        ("dest", task.dest.is_some(), &[Transform, Inject, Optimize]),
        ("patterns", !task.patterns.is_empty(), &[Clean, Watch]),
        ("document", task.document.is_some(), &[Inject, Optimize]),
        ("targets", !task.targets.is_empty(), &[Inject]),
        ("search", !task.search.is_empty(), &[Optimize]),
        ("filters", !task.filters.is_empty(), &[Optimize]),
        ("run", task.run.is_some(), &[Watch]),
        (
            "use_hash/debounce_ms",
            task.use_hash.is_some() || task.debounce_ms.is_some(),
            &[Watch],
        ),
    ];
    for (field, present, kinds) in fields {
        if present && !kinds.contains(&kind) {
            return Err(ConfigError::Invalid(format!(
                "task '{name}': `{field}` is not used by {kind:?} tasks"
            )));
        }
    }
    Ok(())
}

/// Expand `{var}` references inside string option values.
fn expand_option(vars: &Vars, value: toml::Value) -> ConfigResult<toml::Value> {
    Ok(match value {
        toml::Value::String(s) => toml::Value::String(vars.expand(&s)?),
        toml::Value::Array(items) => toml::Value::Array(
            items
                .into_iter()
                .map(|item| expand_option(vars, item))
                .collect::<ConfigResult<_>>()?,
        ),
        other => other,
    })
}

fn steps(vars: &Vars, pipe: &[StepConfig]) -> ConfigResult<Vec<Step>> {
    pipe.iter()
        .map(|step| {
            let options = step
                .options()
                .into_iter()
                .map(|(key, value)| Ok((key, expand_option(vars, value)?)))
                .collect::<ConfigResult<toml::Table>>()?;
            Ok(Step {
                adapter: step.adapter().to_string(),
                options: StepOptions::new(options),
            })
        })
        .collect()
}

/// Resolve one task's config into its action. `None` means a group.
pub fn resolve_action(
    cfg: &ConfigFile,
    vars: &Vars,
    name: &str,
    task: &TaskConfig,
) -> ConfigResult<Option<TaskAction>> {
    reject_unused(name, task.kind, task)?;
    let outputs = OutputDirs::new(vars)?;
    let dest = |value: Option<&String>| -> ConfigResult<PathBuf> {
        let raw = required(value, name, "dest")?;
        let path = normalize_lexically(Path::new(&vars.expand(raw)?));
        outputs.check(name, "dest", &path)?;
        Ok(path)
    };
    let document = |value: Option<&String>| -> ConfigResult<PathBuf> {
        let raw = required(value, name, "document")?;
        Ok(normalize_lexically(Path::new(&vars.expand(raw)?)))
    };

    let action = match task.kind {
        TaskKind::Group => None,
        TaskKind::Transform => Some(TaskAction::Transform(TransformAction {
            src: vars.expand_patterns(required_list(&task.src, name, "src")?)?,
            order: vars.expand_patterns(&task.order)?,
            steps: steps(vars, &task.pipe)?,
            dest: dest(task.dest.as_ref())?,
        })),
        TaskKind::Clean => {
            let patterns = vars.expand_patterns(required_list(&task.patterns, name, "patterns")?)?;
            for pattern in patterns.iter().filter(|p| !p.starts_with('!')) {
                let base = if has_magic(pattern) {
                    glob_base(pattern)
                } else {
                    PathBuf::from(pattern)
                };
                outputs.check(name, "clean pattern", &normalize_lexically(&base))?;
            }
            Some(TaskAction::Clean(CleanAction { patterns }))
        }
        TaskKind::Inject => {
            if task.targets.is_empty() {
                return Err(ConfigError::MissingOption(format!("task.{name}.targets")));
            }
            let mut seen: Vec<Option<&str>> = Vec::new();
            let mut targets = Vec::with_capacity(task.targets.len());
            for target in &task.targets {
                let label = target.label.as_deref();
                if seen.contains(&label) {
                    return Err(ConfigError::Invalid(format!(
                        "task '{name}': injection label '{}' is listed more than once",
                        label.unwrap_or("<default>")
                    )));
                }
                seen.push(label);
                targets.push(InjectTarget {
                    label: target.label.clone(),
                    src: vars.expand_patterns(required_list(&target.src, name, "targets.src")?)?,
                    order: vars.expand_patterns(&target.order)?,
                    template: target.template.clone(),
                });
            }
            Some(TaskAction::Inject(InjectAction {
                document: document(task.document.as_ref())?,
                dest: dest(task.dest.as_ref())?,
                targets,
            }))
        }
        TaskKind::Optimize => {
            let document = document(task.document.as_ref())?;
            let search = if task.search.is_empty() {
                vec![document.parent().map(Path::to_path_buf).unwrap_or_default()]
            } else {
                task.search
                    .iter()
                    .map(|dir| Ok(normalize_lexically(Path::new(&vars.expand(dir)?))))
                    .collect::<ConfigResult<Vec<_>>>()?
            };
            let filters = task
                .filters
                .iter()
                .map(|f| {
                    Ok(BundleFilter {
                        pattern: vars.expand(&f.pattern)?,
                        steps: steps(vars, &f.pipe)?,
                    })
                })
                .collect::<ConfigResult<Vec<_>>>()?;
            Some(TaskAction::Optimize(OptimizeAction {
                document,
                dest: dest(task.dest.as_ref())?,
                search,
                filters,
            }))
        }
        TaskKind::Watch => {
            let run = required(task.run.as_ref(), name, "run")?;
            if !cfg.task.contains_key(run) {
                return Err(ConfigError::UnknownDependency {
                    task: name.to_string(),
                    dep: run.clone(),
                });
            }
            Some(TaskAction::Watch(WatchAction {
                patterns: vars.expand_patterns(required_list(&task.patterns, name, "patterns")?)?,
                run: run.clone(),
                use_hash: task.use_hash.unwrap_or(false),
                debounce_ms: task.debounce_ms.unwrap_or(cfg.config.debounce_ms),
                behaviour: cfg.config.triggered_while_running_behaviour,
            }))
        }
    };
    Ok(action)
}

/// Every adapter name an action refers to.
fn adapters_of(action: &TaskAction) -> Vec<&str> {
    match action {
        TaskAction::Transform(t) => t.steps.iter().map(|s| s.adapter.as_str()).collect(),
        TaskAction::Optimize(o) => o
            .filters
            .iter()
            .flat_map(|f| f.steps.iter().map(|s| s.adapter.as_str()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Build the task graph for `cfg`, checking every adapter against `registry`.
pub fn build_graph(cfg: &ConfigFile, registry: &AdapterRegistry) -> ConfigResult<TaskGraph> {
    let vars = Vars::from_config(cfg);
    let mut graph = TaskGraph::new();

    for (name, task) in cfg.tasks() {
        let action = resolve_action(cfg, &vars, name, task)?;
        if let Some(action) = &action {
            if let Some(adapter) = adapters_of(action).into_iter().find(|a| !registry.contains(a)) {
                return Err(ConfigError::UnknownAdapter {
                    task: name.clone(),
                    adapter: adapter.to_string(),
                });
            }
        }
        let meta = TaskMeta {
            description: task.description.clone(),
            notify: task.notify.clone(),
        };
        graph.register_with_meta(name.clone(), task.after.clone(), action, meta)?;
    }

    graph.validate()?;
    debug!(tasks = graph.len(), "task graph built");
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RawConfigFile;

    fn config(toml_src: &str) -> ConfigFile {
        let raw: RawConfigFile = toml::from_str(toml_src).unwrap();
        ConfigFile::new_unchecked(raw)
    }

    const BASE: &str = r#"
[paths]
client = "src/client/"
temp = ".tmp/"
build = "build/"

[globs]
ts = ["{client}app/**/*.ts", "!{client}app/**/*.spec.ts"]
"#;

    #[test]
    fn transform_is_fully_expanded() {
        let cfg = config(&format!(
            "{BASE}\n[task.scripts]\nkind = \"transform\"\nsrc = [\"@ts\"]\npipe = [\"typescript\", {{ use = \"js-minify\", target = \"es2017\" }}]\ndest = \"{{temp}}js\"\n"
        ));
        let vars = Vars::from_config(&cfg);
        let action = resolve_action(&cfg, &vars, "scripts", &cfg.task["scripts"]).unwrap();
        let Some(TaskAction::Transform(t)) = action else {
            panic!("expected transform, got {action:?}");
        };
        assert_eq!(t.src, vec!["src/client/app/**/*.ts", "!src/client/app/**/*.spec.ts"]);
        assert_eq!(t.dest, PathBuf::from(".tmp/js"));
        assert_eq!(t.steps[0].adapter, "typescript");
        assert_eq!(t.steps[1].options.get_str("target").unwrap(), Some("es2017"));
    }

    #[test]
    fn dest_outside_output_dirs_is_rejected() {
        let cfg = config(&format!(
            "{BASE}\n[task.scripts]\nkind = \"transform\"\nsrc = [\"@ts\"]\ndest = \"{{client}}\"\n"
        ));
        let vars = Vars::from_config(&cfg);
        let err = resolve_action(&cfg, &vars, "scripts", &cfg.task["scripts"]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("outside")));
    }

    #[test]
    fn unused_field_is_rejected() {
        let cfg = config(&format!("{BASE}\n[task.all]\nsrc = [\"x\"]\n"));
        let vars = Vars::from_config(&cfg);
        assert!(matches!(
            resolve_action(&cfg, &vars, "all", &cfg.task["all"]),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_adapter_fails_graph_build() {
        let cfg = config(&format!(
            "{BASE}\n[task.styles]\nkind = \"transform\"\nsrc = [\"x.less\"]\npipe = [\"less\"]\ndest = \"{{temp}}\"\n"
        ));
        let err = build_graph(&cfg, &AdapterRegistry::with_defaults()).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownAdapter {
                task: "styles".into(),
                adapter: "less".into()
            }
        );
    }

    #[test]
    fn clean_pattern_base_must_be_an_output_dir() {
        let cfg = config(&format!(
            "{BASE}\n[task.clean]\nkind = \"clean\"\npatterns = [\"{{build}}\", \"{{temp}}**/*.js\"]\n\n[task.bad]\nkind = \"clean\"\npatterns = [\"src/**/*.js\"]\n"
        ));
        let vars = Vars::from_config(&cfg);
        assert!(resolve_action(&cfg, &vars, "clean", &cfg.task["clean"]).is_ok());
        assert!(resolve_action(&cfg, &vars, "bad", &cfg.task["bad"]).is_err());
    }

    #[test]
    fn graph_carries_dependencies_and_meta() {
        let cfg = config(&format!(
            "{BASE}\n[task.clean]\nkind = \"clean\"\npatterns = [\"{{temp}}\"]\n\n[task.build]\ndescription = \"Everything\"\nafter = [\"clean\"]\nnotify = {{ title = \"Built\" }}\n"
        ));
        let graph = build_graph(&cfg, &AdapterRegistry::with_defaults()).unwrap();
        let build = graph.node("build").unwrap();
        assert!(build.is_group());
        assert_eq!(build.dependencies, vec!["clean".to_string()]);
        assert_eq!(build.meta.description.as_deref(), Some("Everything"));
        assert_eq!(build.meta.notify.as_ref().map(|n| n.title.as_str()), Some("Built"));
    }
}
