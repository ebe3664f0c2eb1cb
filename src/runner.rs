// src/runner.rs

//! Entry point: resolve a requested name through the graph, execute it and
//! turn the outcome into an exit status.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ConfigFile;
use crate::errors::{PipelineError, Result};
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::{ExecContext, Report, TaskGraph, execute_plan};
use crate::observer::{Observer, TracingObserver};
use crate::task::TaskContext;
use crate::types::Mode;

#[derive(Debug)]
pub struct Runner {
    graph: TaskGraph,
    ctx: TaskContext,
    fail_fast: bool,
    max_parallel: usize,
}

impl Runner {
    pub fn new(graph: TaskGraph, ctx: TaskContext) -> Self {
        Self {
            graph,
            ctx,
            fail_fast: false,
            max_parallel: 0,
        }
    }

    /// Runner over the real filesystem, reporting progress through
    /// `tracing`, with execution policy taken from `[config]`.
    pub fn from_config(cfg: &ConfigFile, root: PathBuf, mode: Mode) -> Result<Self> {
        let graph = TaskGraph::from_config(cfg, mode)?;
        let ctx = TaskContext {
            fs: Arc::new(RealFileSystem) as Arc<dyn FileSystem>,
            root,
            observer: Arc::new(TracingObserver) as Arc<dyn Observer>,
        };
        Ok(Self::new(graph, ctx)
            .fail_fast(cfg.config.fail_fast)
            .max_parallel(cfg.config.max_parallel))
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    pub fn max_parallel(mut self, limit: usize) -> Self {
        self.max_parallel = limit;
        self
    }

    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Fresh execution context carrying this runner's policy.
    pub fn exec_context(&self) -> ExecContext {
        ExecContext::new(self.ctx.clone())
            .fail_fast(self.fail_fast)
            .max_parallel(self.max_parallel)
    }

    /// Resolve and execute `name`.
    ///
    /// If the plan ends in watch mode, Ctrl-C stops the watcher and the
    /// run returns once in-flight task runs have finished.
    pub async fn run(&self, name: &str) -> Result<Report> {
        let plan = self.graph.resolve(name)?;
        let ctx = self.exec_context();

        let ctrl_c = plan.contains_watch().then(|| {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("failed to listen for Ctrl+C: {e}");
                    return;
                }
                info!("Ctrl+C received; stopping watchers");
                ctx.request_shutdown();
            })
        });

        info!(entry = %plan.name(), requested = %name, "running");
        let result = execute_plan(plan, ctx).await;

        if let Some(handle) = ctrl_c {
            handle.abort();
        }
        result
    }

    /// Resolve and execute `name` with a caller-supplied context.
    pub async fn run_with(&self, name: &str, ctx: ExecContext) -> Result<Report> {
        let plan = self.graph.resolve(name)?;
        execute_plan(plan, ctx).await
    }
}

/// Process exit status for a run outcome.
pub fn exit_status<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(_) => 1,
    }
}

/// Lines printed to stderr for a failed run: the top-level error, then every
/// leaf failure it contains.
pub fn failure_lines(err: &PipelineError) -> Vec<String> {
    let mut lines = vec![format!("assetpipe: {err}")];
    match err.leaf_errors().as_slice() {
        // Not a composite; already printed.
        [only] if std::ptr::eq(*only, err) => {}
        leaves => {
            for leaf in leaves {
                lines.push(format!("  - {leaf}"));
            }
        }
    }
    lines
}
