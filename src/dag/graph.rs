// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::dag::action::{TaskAction, TaskMeta};
use crate::engine::TaskName;
use crate::errors::{AssetdagError, ConfigError, Result};

/// A named unit of work with declared dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub name: TaskName,
    /// Names in `after = [...]`, in declaration order.
    pub dependencies: Vec<TaskName>,
    /// `None` for group tasks.
    pub action: Option<TaskAction>,
    pub meta: TaskMeta,
}

impl TaskNode {
    pub fn is_group(&self) -> bool {
        self.action.is_none()
    }
}

/// Directed acyclic graph of [`TaskNode`]s, keyed by name.
///
/// Edges point from a dependency to its dependent. The graph owns its nodes;
/// there is no ambient registry.
#[derive(Debug, Clone, Default)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskName, TaskNode>,
    /// Reverse edges: task -> tasks listing it in `after`.
    dependents: BTreeMap<TaskName, BTreeSet<TaskName>>,
}

impl TaskGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node.
    ///
    /// Dependencies may name tasks that are registered later; use
    /// [`TaskGraph::validate`] once all nodes are in. A duplicate name or an
    /// edge that would close a cycle is rejected and the graph is unchanged.
    pub fn register(
        &mut self,
        name: impl Into<TaskName>,
        dependencies: Vec<TaskName>,
        action: Option<TaskAction>,
    ) -> std::result::Result<(), ConfigError> {
        self.register_with_meta(name, dependencies, action, TaskMeta::default())
    }

    pub fn register_with_meta(
        &mut self,
        name: impl Into<TaskName>,
        dependencies: Vec<TaskName>,
        action: Option<TaskAction>,
        meta: TaskMeta,
    ) -> std::result::Result<(), ConfigError> {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return Err(ConfigError::DuplicateTask(name));
        }
        if dependencies.iter().any(|d| d == &name) {
            return Err(ConfigError::Cycle { task: name });
        }
        self.check_acyclic_with(&name, &dependencies)?;

        for dep in &dependencies {
            self.dependents
                .entry(dep.clone())
                .or_default()
                .insert(name.clone());
        }
        debug!(task = %name, deps = ?dependencies, group = action.is_none(), "registered task");
        self.nodes.insert(
            name.clone(),
            TaskNode {
                name,
                dependencies,
                action,
                meta,
            },
        );
        Ok(())
    }

    /// Toposort the graph as it would look with the new node added.
    fn check_acyclic_with(
        &self,
        name: &str,
        dependencies: &[TaskName],
    ) -> std::result::Result<(), ConfigError> {
        let mut g: DiGraphMap<&str, ()> = DiGraphMap::new();
        for node in self.nodes.values() {
            g.add_node(node.name.as_str());
            for dep in &node.dependencies {
                g.add_edge(dep.as_str(), node.name.as_str(), ());
            }
        }
        g.add_node(name);
        for dep in dependencies {
            g.add_edge(dep.as_str(), name, ());
        }

        toposort(&g, None).map(|_| ()).map_err(|cycle| ConfigError::Cycle {
            task: cycle.node_id().to_string(),
        })
    }

    /// Reject dependencies on names that were never registered.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        for node in self.nodes.values() {
            for dep in &node.dependencies {
                if !self.nodes.contains_key(dep) {
                    return Err(ConfigError::UnknownDependency {
                        task: node.name.clone(),
                        dep: dep.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.get(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Task names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(String::as_str)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TaskNode> {
        self.nodes.values()
    }

    pub fn dependencies_of(&self, name: &str) -> &[TaskName] {
        self.nodes
            .get(name)
            .map(|n| n.dependencies.as_slice())
            .unwrap_or_default()
    }

    pub fn dependents_of(&self, name: &str) -> impl Iterator<Item = &TaskName> {
        self.dependents.get(name).into_iter().flatten()
    }

    /// `target` plus everything it transitively depends on.
    pub fn closure(&self, target: &str) -> Result<BTreeSet<TaskName>> {
        if !self.contains(target) {
            return Err(AssetdagError::TaskNotFound(target.to_string()));
        }
        let mut seen = BTreeSet::new();
        let mut stack = vec![target.to_string()];
        while let Some(name) = stack.pop() {
            if seen.insert(name.clone()) {
                stack.extend(self.dependencies_of(&name).iter().cloned());
            }
        }
        Ok(seen)
    }

    /// A valid sequential execution order for `target`'s closure.
    ///
    /// Among tasks whose dependencies are all placed, the alphabetically
    /// first goes next, so the order is deterministic.
    pub fn execution_order(&self, target: &str) -> Result<Vec<TaskName>> {
        let closure = self.closure(target)?;
        let mut placed: BTreeSet<&str> = BTreeSet::new();
        let mut order = Vec::with_capacity(closure.len());

        while order.len() < closure.len() {
            let next = closure.iter().find(|name| {
                !placed.contains(name.as_str())
                    && self
                        .dependencies_of(name)
                        .iter()
                        .all(|d| placed.contains(d.as_str()))
            });
            match next {
                Some(name) => {
                    placed.insert(name.as_str());
                    order.push(name.clone());
                }
                None => {
                    return Err(ConfigError::Cycle {
                        task: target.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deps(names: &[&str]) -> Vec<TaskName> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn cycle_is_rejected_at_registration() {
        let mut g = TaskGraph::new();
        g.register("a", deps(&["c"]), None).unwrap();
        g.register("b", deps(&["a"]), None).unwrap();
        let err = g.register("c", deps(&["b"]), None).unwrap_err();
        assert!(matches!(err, ConfigError::Cycle { .. }));
        assert!(!g.contains("c"));
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let mut g = TaskGraph::new();
        let err = g.register("a", deps(&["a"]), None).unwrap_err();
        assert_eq!(err, ConfigError::Cycle { task: "a".into() });
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut g = TaskGraph::new();
        g.register("a", vec![], None).unwrap();
        assert_eq!(
            g.register("a", vec![], None).unwrap_err(),
            ConfigError::DuplicateTask("a".into())
        );
    }

    #[test]
    fn validate_reports_unknown_dependency() {
        let mut g = TaskGraph::new();
        g.register("build", deps(&["styles"]), None).unwrap();
        assert_eq!(
            g.validate().unwrap_err(),
            ConfigError::UnknownDependency {
                task: "build".into(),
                dep: "styles".into()
            }
        );
    }

    #[test]
    fn closure_follows_dependencies_only() {
        let mut g = TaskGraph::new();
        g.register("clean", vec![], None).unwrap();
        g.register("styles", deps(&["clean"]), None).unwrap();
        g.register("scripts", vec![], None).unwrap();
        g.register("build", deps(&["styles", "scripts"]), None).unwrap();

        let c = g.closure("styles").unwrap();
        assert_eq!(c.into_iter().collect::<Vec<_>>(), deps(&["clean", "styles"]));
        assert!(matches!(
            g.closure("nope"),
            Err(AssetdagError::TaskNotFound(_))
        ));
    }

    #[test]
    fn execution_order_is_topological() {
        let mut g = TaskGraph::new();
        g.register("build", deps(&["styles", "scripts"]), None).unwrap();
        g.register("styles", deps(&["clean"]), None).unwrap();
        g.register("scripts", vec![], None).unwrap();
        g.register("clean", vec![], None).unwrap();

        assert_eq!(
            g.execution_order("build").unwrap(),
            deps(&["clean", "scripts", "styles", "build"])
        );
    }
}
