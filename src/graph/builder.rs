// src/graph/builder.rs

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::DEFAULT_ALIAS;
use crate::errors::{PipelineError, Result};
use crate::graph::node::{Node, Unit};
use crate::graph::task_graph::TaskGraph;
use crate::task::TaskSpec;
use crate::types::TaskName;
use crate::watch::{WatchBinding, WatchSpec};

/// Explicit, side-effect-free construction of a [`TaskGraph`].
///
/// ```ignore
/// let graph = TaskGraphBuilder::new()
///     .task(styles)
///     .task(scripts)
///     .parallel("build", ["styles", "scripts"])
///     .series("dev", [Unit::from("build"), Unit::from("watch")])
///     .default_task("build")
///     .build()?;
/// ```
///
/// Nothing is validated until [`TaskGraphBuilder::build`].
#[derive(Debug, Default)]
pub struct TaskGraphBuilder {
    entries: Vec<(TaskName, Node)>,
    default: Option<TaskName>,
}

impl TaskGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf task, keyed by its own name.
    pub fn task(mut self, spec: impl Into<Arc<TaskSpec>>) -> Self {
        let spec = spec.into();
        self.entries
            .push((spec.name().to_string(), Node::Task(spec)));
        self
    }

    /// Add a group whose members run concurrently.
    pub fn parallel<I, U>(mut self, name: impl Into<TaskName>, units: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Unit>,
    {
        let units = units.into_iter().map(Into::into).collect();
        self.entries.push((name.into(), Node::Parallel(units)));
        self
    }

    /// Add a group whose members run one after another.
    pub fn series<I, U>(mut self, name: impl Into<TaskName>, units: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Unit>,
    {
        let units = units.into_iter().map(Into::into).collect();
        self.entries.push((name.into(), Node::Sequential(units)));
        self
    }

    /// Add a watcher that re-runs bound tasks on change.
    pub fn watch(
        mut self,
        name: impl Into<TaskName>,
        debounce: Duration,
        bindings: Vec<WatchBinding>,
    ) -> Self {
        let name = name.into();
        let spec = WatchSpec {
            name: name.clone(),
            bindings,
            debounce,
        };
        self.entries.push((name, Node::Watch(Arc::new(spec))));
        self
    }

    /// Entry that `resolve("default")` maps to.
    pub fn default_task(mut self, name: impl Into<TaskName>) -> Self {
        self.default = Some(name.into());
        self
    }

    /// Validate and freeze the graph.
    ///
    /// Fails on duplicate or reserved names, empty groups, references to
    /// unknown entries, watch bindings to anything but a leaf task of this
    /// graph, and cycles.
    pub fn build(self) -> Result<TaskGraph> {
        let mut nodes: BTreeMap<TaskName, Node> = BTreeMap::new();

        for (name, node) in self.entries {
            if name == DEFAULT_ALIAS {
                return Err(PipelineError::ConfigError(format!(
                    "'{}' is reserved for the default alias",
                    DEFAULT_ALIAS
                )));
            }
            if nodes.contains_key(&name) {
                return Err(PipelineError::ConfigError(format!(
                    "graph entry '{}' declared more than once",
                    name
                )));
            }
            nodes.insert(name, node);
        }

        for (name, node) in nodes.iter() {
            validate_node(name, node, &nodes)?;
        }

        if let Some(target) = &self.default {
            if !nodes.contains_key(target) {
                return Err(PipelineError::UnknownTask(target.clone()));
            }
        }

        ensure_acyclic(&nodes)?;

        debug!(entries = nodes.len(), default = ?self.default, "task graph built");
        Ok(TaskGraph::new(nodes, self.default))
    }
}

fn validate_node(name: &str, node: &Node, nodes: &BTreeMap<TaskName, Node>) -> Result<()> {
    match node {
        Node::Task(_) => Ok(()),
        Node::Parallel(units) | Node::Sequential(units) => {
            if units.is_empty() || units.iter().any(Unit::has_empty_group) {
                return Err(PipelineError::ConfigError(format!(
                    "group '{}' contains an empty group",
                    name
                )));
            }
            for referenced in node.refs() {
                if !nodes.contains_key(referenced) {
                    return Err(PipelineError::UnknownTask(referenced.to_string()));
                }
            }
            Ok(())
        }
        Node::Watch(spec) => {
            if spec.bindings.is_empty() {
                return Err(PipelineError::ConfigError(format!(
                    "watcher '{}' has no bindings",
                    name
                )));
            }
            for binding in &spec.bindings {
                let bound = binding.task().name();
                match nodes.get(bound) {
                    Some(Node::Task(_)) => {}
                    Some(other) => {
                        return Err(PipelineError::ConfigError(format!(
                            "watcher '{}' binds '{}', which is a {} entry, not a task",
                            name,
                            bound,
                            other.kind()
                        )));
                    }
                    None => return Err(PipelineError::UnknownTask(bound.to_string())),
                }
                if binding.patterns().is_empty() {
                    return Err(PipelineError::ConfigError(format!(
                        "watcher '{}': binding for '{}' has no patterns",
                        name, bound
                    )));
                }
            }
            Ok(())
        }
    }
}

fn ensure_acyclic(nodes: &BTreeMap<TaskName, Node>) -> Result<()> {
    // Edge direction: entry -> referenced entry.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for name in nodes.keys() {
        graph.add_node(name.as_str());
    }
    for (name, node) in nodes.iter() {
        for referenced in node.refs() {
            graph.add_edge(name.as_str(), referenced, ());
        }
    }

    match toposort(&graph, None) {
        Ok(_) => Ok(()),
        Err(cycle) => Err(PipelineError::Cycle(cycle.node_id().to_string())),
    }
}
