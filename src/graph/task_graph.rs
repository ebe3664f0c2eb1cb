// src/graph/task_graph.rs

use std::collections::BTreeMap;

use crate::config::DEFAULT_ALIAS;
use crate::errors::{PipelineError, Result};
use crate::graph::node::{Node, Plan, Unit};
use crate::types::TaskName;

/// Immutable, validated task graph.
///
/// Built through [`crate::graph::TaskGraphBuilder`] or
/// [`TaskGraph::from_config`]; holds every leaf task by `Arc` so watch
/// bindings and plans share the same specs.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: BTreeMap<TaskName, Node>,
    default: Option<TaskName>,
}

impl TaskGraph {
    pub(crate) fn new(nodes: BTreeMap<TaskName, Node>, default: Option<TaskName>) -> Self {
        Self { nodes, default }
    }

    /// Entry names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// `(name, kind)` for every entry, sorted by name.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &'static str)> {
        self.nodes.iter().map(|(name, node)| (name.as_str(), node.kind()))
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.get(name)
    }

    /// Target of the `default` alias, if one was configured.
    pub fn default_target(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// Resolve an entry (or `default`) into an executable plan.
    ///
    /// Unknown names always fail with `UnknownTask`; an empty plan is never
    /// returned.
    pub fn resolve(&self, name: &str) -> Result<Plan> {
        let target = if name == DEFAULT_ALIAS {
            self.default
                .as_deref()
                .ok_or_else(|| PipelineError::UnknownTask(name.to_string()))?
        } else {
            name
        };
        self.resolve_entry(target)
    }

    fn resolve_entry(&self, name: &str) -> Result<Plan> {
        let node = self
            .nodes
            .get(name)
            .ok_or_else(|| PipelineError::UnknownTask(name.to_string()))?;

        Ok(match node {
            Node::Task(spec) => Plan::Task(spec.clone()),
            Node::Watch(spec) => Plan::Watch(spec.clone()),
            Node::Parallel(units) => Plan::Parallel {
                name: name.to_string(),
                units: self.resolve_units(name, units)?,
            },
            Node::Sequential(units) => Plan::Sequential {
                name: name.to_string(),
                units: self.resolve_units(name, units)?,
            },
        })
    }

    fn resolve_units(&self, parent: &str, units: &[Unit]) -> Result<Vec<Plan>> {
        units
            .iter()
            .enumerate()
            .map(|(index, unit)| self.resolve_unit(parent, index, unit))
            .collect()
    }

    fn resolve_unit(&self, parent: &str, index: usize, unit: &Unit) -> Result<Plan> {
        match unit {
            Unit::Ref(name) => self.resolve_entry(name),
            Unit::Parallel(units) => {
                let name = format!("{parent}[{index}]");
                let units = self.resolve_units(&name, units)?;
                Ok(Plan::Parallel { name, units })
            }
            Unit::Sequential(units) => {
                let name = format!("{parent}[{index}]");
                let units = self.resolve_units(&name, units)?;
                Ok(Plan::Sequential { name, units })
            }
        }
    }
}
