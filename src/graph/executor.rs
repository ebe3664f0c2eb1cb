// src/graph/executor.rs

//! Plan execution.
//!
//! Parallel groups spawn every member on a `JoinSet` and wait for all of
//! them; sequences await each member before starting the next. Leaf tasks
//! optionally share a semaphore (`max_parallel`) and a fail-fast flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::anyhow;
use tokio::sync::{Semaphore, watch};
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::errors::{PipelineError, Result};
use crate::graph::node::Plan;
use crate::graph::report::Report;
use crate::observer::ProgressEvent;
use crate::task::{TaskContext, TaskSpec};
use crate::types::{BoxFuture, TaskName};
use crate::watch::{WatchSpec, run_until_shutdown};

/// Shared state for one execution of a plan.
///
/// Cheap to clone; clones share the limiter, the fail-fast flag and the
/// shutdown signal.
#[derive(Debug, Clone)]
pub struct ExecContext {
    pub task: TaskContext,
    fail_fast: bool,
    limiter: Option<Arc<Semaphore>>,
    tripped: Arc<AtomicBool>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ExecContext {
    pub fn new(task: TaskContext) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            task,
            fail_fast: false,
            limiter: None,
            tripped: Arc::new(AtomicBool::new(false)),
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        }
    }

    pub fn fail_fast(mut self, enabled: bool) -> Self {
        self.fail_fast = enabled;
        self
    }

    /// Bound the number of leaf tasks running at once; `0` means unlimited.
    pub fn max_parallel(mut self, limit: usize) -> Self {
        self.limiter = (limit > 0).then(|| Arc::new(Semaphore::new(limit)));
        self
    }

    /// Ask running watchers to stop. Plans without a watcher are unaffected.
    pub fn request_shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Whether a leaf failure has been recorded during this execution.
    pub fn has_failed(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }
}

/// Execute a resolved plan.
pub fn execute_plan(plan: Plan, ctx: ExecContext) -> BoxFuture<'static, Result<Report>> {
    Box::pin(async move {
        match plan {
            Plan::Task(spec) => run_leaf(spec, &ctx).await,
            Plan::Parallel { name, units } => run_parallel(name, units, ctx).await,
            Plan::Sequential { name, units } => run_sequential(name, units, ctx).await,
            Plan::Watch(spec) => run_watch(spec, &ctx).await,
        }
    })
}

async fn run_leaf(spec: Arc<TaskSpec>, ctx: &ExecContext) -> Result<Report> {
    let _permit = match &ctx.limiter {
        Some(limiter) => Some(
            limiter
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| anyhow!(e).context("task limiter closed"))?,
        ),
        None => None,
    };

    if ctx.fail_fast && ctx.tripped.load(Ordering::SeqCst) {
        ctx.task.observer.on_event(&ProgressEvent::TaskSkipped {
            task: spec.name().to_string(),
        });
        return Ok(Report::skipped(spec.name()));
    }

    match spec.run(&ctx.task).await {
        Ok(report) => Ok(Report::from_task(report)),
        Err(err) => {
            ctx.tripped.store(true, Ordering::SeqCst);
            Err(err)
        }
    }
}

async fn run_parallel(name: TaskName, units: Vec<Plan>, ctx: ExecContext) -> Result<Report> {
    let total = units.len();
    debug!(group = %name, units = total, "starting parallel group");

    let mut set = JoinSet::new();
    for (index, unit) in units.into_iter().enumerate() {
        let fut = execute_plan(unit, ctx.clone());
        set.spawn(async move { (index, fut.await) });
    }

    let mut results = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => results.push((
                total,
                Err(PipelineError::Other(
                    anyhow!(e).context(format!("unit of group '{}' panicked", name)),
                )),
            )),
        }
    }
    // Completion order is arbitrary; report in declaration order.
    results.sort_by_key(|(index, _)| *index);

    let mut report = Report::default();
    let mut failures = Vec::new();
    for (_, result) in results {
        match result {
            Ok(unit_report) => report.merge(unit_report),
            Err(err) => failures.push(err),
        }
    }

    if failures.is_empty() {
        Ok(report)
    } else {
        info!(group = %name, failed = failures.len(), total, "parallel group failed");
        Err(PipelineError::Parallel {
            group: name,
            total,
            failures,
        })
    }
}

async fn run_sequential(name: TaskName, units: Vec<Plan>, ctx: ExecContext) -> Result<Report> {
    debug!(group = %name, units = units.len(), "starting sequence");

    let mut report = Report::default();
    for (index, unit) in units.into_iter().enumerate() {
        let step = unit.name().to_string();
        match execute_plan(unit, ctx.clone()).await {
            Ok(unit_report) => report.merge(unit_report),
            Err(err) => {
                info!(group = %name, step = %step, index, "sequence aborted");
                return Err(PipelineError::SequenceAborted {
                    group: name,
                    step,
                    index,
                    source: Box::new(err),
                });
            }
        }
    }
    Ok(report)
}

async fn run_watch(spec: Arc<WatchSpec>, ctx: &ExecContext) -> Result<Report> {
    let summary = run_until_shutdown(
        spec.as_ref().clone(),
        ctx.task.clone(),
        ctx.shutdown_rx.clone(),
    )
    .await?;
    Ok(Report::watched(spec.name.as_str(), summary))
}
