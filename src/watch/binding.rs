// src/watch/binding.rs

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::task::{PathSet, TaskSpec};
use crate::types::TaskName;

/// Associates a glob pattern set with the task it re-runs.
///
/// The binding references the task; the graph owns it.
#[derive(Clone)]
pub struct WatchBinding {
    patterns: PathSet,
    task: Arc<TaskSpec>,
}

impl fmt::Debug for WatchBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchBinding")
            .field("patterns", &self.patterns.patterns())
            .field("task", &self.task.name())
            .finish()
    }
}

impl WatchBinding {
    pub fn new(patterns: PathSet, task: Arc<TaskSpec>) -> Self {
        Self { patterns, task }
    }

    /// Bind a task to its own source patterns.
    pub fn for_task(task: Arc<TaskSpec>) -> Self {
        Self {
            patterns: task.sources().clone(),
            task,
        }
    }

    pub fn patterns(&self) -> &PathSet {
        &self.patterns
    }

    pub fn task(&self) -> &Arc<TaskSpec> {
        &self.task
    }

    /// Whether a root-relative path (forward slashes) should trigger this
    /// binding.
    pub fn matches(&self, rel_path: &str) -> bool {
        self.patterns.matches(rel_path)
    }
}

/// A named watch unit in the task graph.
#[derive(Debug, Clone)]
pub struct WatchSpec {
    pub name: TaskName,
    pub bindings: Vec<WatchBinding>,
    /// Coalescing window: events for the same binding closer together than
    /// this collapse into one task run.
    pub debounce: Duration,
}
