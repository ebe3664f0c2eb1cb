// src/observer.rs

//! Progress reporting hook.
//!
//! Tasks and the watcher never log progress directly; they emit
//! [`ProgressEvent`]s to an [`Observer`]. The runner installs a
//! [`TracingObserver`]; tests install a recorder. Observers are shared by
//! concurrently running tasks, so implementations must tolerate concurrent
//! calls (event order across tasks is not significant).

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::types::TaskName;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    TaskStarted {
        task: TaskName,
        files: usize,
    },
    FileWritten {
        task: TaskName,
        path: PathBuf,
    },
    TaskFinished {
        task: TaskName,
        files_written: usize,
    },
    TaskFailed {
        task: TaskName,
        error: String,
    },
    /// Not started because an earlier failure tripped fail-fast.
    TaskSkipped {
        task: TaskName,
    },
    WatchStarted {
        watcher: TaskName,
        bindings: usize,
    },
    WatchTriggered {
        watcher: TaskName,
        task: TaskName,
        events: usize,
    },
    WatchStopped {
        watcher: TaskName,
    },
}

impl ProgressEvent {
    /// Name of the task (or watcher) the event is about.
    pub fn subject(&self) -> &str {
        match self {
            ProgressEvent::TaskStarted { task, .. }
            | ProgressEvent::FileWritten { task, .. }
            | ProgressEvent::TaskFinished { task, .. }
            | ProgressEvent::TaskFailed { task, .. }
            | ProgressEvent::TaskSkipped { task }
            | ProgressEvent::WatchTriggered { task, .. } => task,
            ProgressEvent::WatchStarted { watcher, .. } | ProgressEvent::WatchStopped { watcher } => {
                watcher
            }
        }
    }
}

pub trait Observer: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Observer that forwards every event to `tracing`.
#[derive(Debug, Clone, Default)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::TaskStarted { task, files } => {
                info!(task = %task, files, "task started");
            }
            ProgressEvent::FileWritten { task, path } => {
                debug!(task = %task, file = ?path, "file written");
            }
            ProgressEvent::TaskFinished {
                task,
                files_written,
            } => {
                info!(task = %task, files_written, "task finished");
            }
            ProgressEvent::TaskFailed { task, error } => {
                warn!(task = %task, error = %error, "task failed");
            }
            ProgressEvent::TaskSkipped { task } => {
                info!(task = %task, "task skipped (fail-fast)");
            }
            ProgressEvent::WatchStarted { watcher, bindings } => {
                info!(watcher = %watcher, bindings, "watching for changes");
            }
            ProgressEvent::WatchTriggered {
                watcher,
                task,
                events,
            } => {
                info!(watcher = %watcher, task = %task, events, "change detected; running task");
            }
            ProgressEvent::WatchStopped { watcher } => {
                info!(watcher = %watcher, "watcher stopped");
            }
        }
    }
}
