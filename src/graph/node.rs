// src/graph/node.rs

use std::fmt::Write as _;
use std::sync::Arc;

use crate::task::TaskSpec;
use crate::types::TaskName;
use crate::watch::WatchSpec;

/// Member of a group as declared to the builder.
///
/// `Ref` names another graph entry; `Parallel` / `Sequential` nest an
/// anonymous group in place, which is named `<parent>[<index>]` when
/// resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Ref(TaskName),
    Parallel(Vec<Unit>),
    Sequential(Vec<Unit>),
}

impl Unit {
    pub fn parallel<I, U>(units: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Unit>,
    {
        Unit::Parallel(units.into_iter().map(Into::into).collect())
    }

    pub fn sequential<I, U>(units: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Unit>,
    {
        Unit::Sequential(units.into_iter().map(Into::into).collect())
    }

    /// Every entry name referenced by this unit, at any depth.
    pub(crate) fn refs(&self) -> Vec<&str> {
        match self {
            Unit::Ref(name) => vec![name.as_str()],
            Unit::Parallel(units) | Unit::Sequential(units) => {
                units.iter().flat_map(|u| u.refs()).collect()
            }
        }
    }

    /// Whether this unit or any nested group is empty.
    pub(crate) fn has_empty_group(&self) -> bool {
        match self {
            Unit::Ref(_) => false,
            Unit::Parallel(units) | Unit::Sequential(units) => {
                units.is_empty() || units.iter().any(Unit::has_empty_group)
            }
        }
    }
}

impl From<&str> for Unit {
    fn from(name: &str) -> Self {
        Unit::Ref(name.to_string())
    }
}

impl From<String> for Unit {
    fn from(name: String) -> Self {
        Unit::Ref(name)
    }
}

impl From<&String> for Unit {
    fn from(name: &String) -> Self {
        Unit::Ref(name.clone())
    }
}

/// A named entry in the task graph.
#[derive(Debug, Clone)]
pub enum Node {
    Task(Arc<TaskSpec>),
    Parallel(Vec<Unit>),
    Sequential(Vec<Unit>),
    Watch(Arc<WatchSpec>),
}

impl Node {
    pub fn kind(&self) -> &'static str {
        match self {
            Node::Task(_) => "task",
            Node::Parallel(_) => "parallel",
            Node::Sequential(_) => "series",
            Node::Watch(_) => "watch",
        }
    }

    /// Entry names this node depends on directly (including through
    /// anonymous nested groups and watch bindings).
    pub(crate) fn refs(&self) -> Vec<&str> {
        match self {
            Node::Task(_) => Vec::new(),
            Node::Parallel(units) | Node::Sequential(units) => {
                units.iter().flat_map(|u| u.refs()).collect()
            }
            Node::Watch(spec) => spec.bindings.iter().map(|b| b.task().name()).collect(),
        }
    }
}

/// Fully resolved, executable form of a graph entry.
///
/// Produced by `TaskGraph::resolve`; every reference has been replaced by
/// the unit it names.
#[derive(Debug, Clone)]
pub enum Plan {
    Task(Arc<TaskSpec>),
    Parallel { name: TaskName, units: Vec<Plan> },
    Sequential { name: TaskName, units: Vec<Plan> },
    Watch(Arc<WatchSpec>),
}

impl Plan {
    pub fn name(&self) -> &str {
        match self {
            Plan::Task(spec) => spec.name(),
            Plan::Parallel { name, .. } | Plan::Sequential { name, .. } => name,
            Plan::Watch(spec) => &spec.name,
        }
    }

    /// Direct children of a group; empty for leaves and watchers.
    pub fn units(&self) -> &[Plan] {
        match self {
            Plan::Parallel { units, .. } | Plan::Sequential { units, .. } => units,
            Plan::Task(_) | Plan::Watch(_) => &[],
        }
    }

    /// Leaf task names in declaration order (depth first). A task reached
    /// through several paths is listed once per path.
    pub fn leaf_names(&self) -> Vec<&str> {
        match self {
            Plan::Task(spec) => vec![spec.name()],
            Plan::Parallel { units, .. } | Plan::Sequential { units, .. } => {
                units.iter().flat_map(|u| u.leaf_names()).collect()
            }
            Plan::Watch(_) => Vec::new(),
        }
    }

    /// Whether running this plan ends in watch mode.
    pub fn contains_watch(&self) -> bool {
        match self {
            Plan::Watch(_) => true,
            Plan::Task(_) => false,
            Plan::Parallel { units, .. } | Plan::Sequential { units, .. } => {
                units.iter().any(Plan::contains_watch)
            }
        }
    }

    /// Indented, human-readable outline used by `--dry-run`.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.describe_into(&mut out, 0);
        out
    }

    fn describe_into(&self, out: &mut String, depth: usize) {
        let pad = "  ".repeat(depth);
        match self {
            Plan::Task(spec) => {
                let _ = writeln!(
                    out,
                    "{pad}{} : {:?} -> {} [{}]",
                    spec.name(),
                    spec.sources().patterns(),
                    spec.destination().display(),
                    spec.stage_names().join(", ")
                );
            }
            Plan::Parallel { name, units } | Plan::Sequential { name, units } => {
                let kind = if matches!(self, Plan::Parallel { .. }) {
                    "parallel"
                } else {
                    "series"
                };
                let _ = writeln!(out, "{pad}{name} ({kind})");
                for unit in units {
                    unit.describe_into(out, depth + 1);
                }
            }
            Plan::Watch(spec) => {
                let _ = writeln!(
                    out,
                    "{pad}{} (watch, debounce {}ms)",
                    spec.name,
                    spec.debounce.as_millis()
                );
                for binding in &spec.bindings {
                    let _ = writeln!(
                        out,
                        "{pad}  {:?} => {}",
                        binding.patterns().patterns(),
                        binding.task().name()
                    );
                }
            }
        }
    }
}
