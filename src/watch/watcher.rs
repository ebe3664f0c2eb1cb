// src/watch/watcher.rs

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::anyhow;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::errors::{PipelineError, Result};
use crate::observer::ProgressEvent;
use crate::task::{TaskContext, TaskReport};
use crate::types::TaskName;
use crate::watch::binding::WatchSpec;
use crate::watch::core::{WatchCommand, WatchCore, WatchState};
use crate::watch::path_utils::relative_str;

/// Counters reported when a watcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchSummary {
    /// Filesystem events received (before matching and debouncing).
    pub events: usize,
    /// Task runs started.
    pub runs: usize,
    /// Task runs that finished with an error.
    pub failures: usize,
}

/// Handle for a running watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping the handle
/// without calling [`WatchHandle::stop`] also stops the event loop.
pub struct WatchHandle {
    name: TaskName,
    stop_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<WatchSummary>,
    state_rx: watch::Receiver<WatchState>,
    _inner: Option<RecommendedWatcher>,
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle")
            .field("name", &self.name)
            .field("state", &*self.state_rx.borrow())
            .finish_non_exhaustive()
    }
}

impl WatchHandle {
    pub fn state(&self) -> WatchState {
        *self.state_rx.borrow()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.state_rx.clone()
    }

    /// Stop watching.
    ///
    /// Pending debounce batches and queued reruns are discarded; task runs
    /// already in flight are allowed to finish before this returns.
    pub async fn stop(mut self) -> Result<WatchSummary> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        let join = self.join;
        join.await.map_err(|e| PipelineError::Watch {
            watcher: self.name.clone(),
            source: anyhow!(e).context("watch loop panicked"),
        })
    }
}

/// Start watching `ctx.root` recursively with the OS file watcher.
pub fn spawn_watcher(spec: WatchSpec, ctx: TaskContext) -> Result<WatchHandle> {
    // Canonicalize once so we have a stable base path.
    let root = ctx
        .root
        .canonicalize()
        .unwrap_or_else(|_| ctx.root.clone());

    let (event_tx, event_rx) = mpsc::unbounded_channel::<PathBuf>();

    // Closure called synchronously by notify whenever an event arrives.
    let watcher_name = spec.name.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                // Reads (including our own source reads) must not trigger.
                if !(event.kind.is_create() || event.kind.is_modify() || event.kind.is_remove()) {
                    return;
                }
                for path in event.paths {
                    if event_tx.send(path).is_err() {
                        // Event loop has exited; nothing left to notify.
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(watcher = %watcher_name, error = %err, "file watch error");
            }
        },
        Config::default(),
    )
    .map_err(|e| PipelineError::Watch {
        watcher: spec.name.clone(),
        source: anyhow!(e).context("creating file watcher"),
    })?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| PipelineError::Watch {
            watcher: spec.name.clone(),
            source: anyhow!(e).context(format!("watching {:?}", root)),
        })?;

    info!(watcher = %spec.name, "file watcher started on {:?}", root);

    let mut handle = spawn_loop(spec, ctx, root, event_rx);
    handle._inner = Some(watcher);
    Ok(handle)
}

/// Start the watch loop on an externally supplied stream of changed paths.
///
/// Paths are interpreted relative to `ctx.root`. Used by tests and by
/// callers that already have their own change feed.
pub fn spawn_watcher_with_events(
    spec: WatchSpec,
    ctx: TaskContext,
    events: mpsc::UnboundedReceiver<PathBuf>,
) -> WatchHandle {
    let root = ctx.root.clone();
    spawn_loop(spec, ctx, root, events)
}

fn spawn_loop(
    spec: WatchSpec,
    ctx: TaskContext,
    root: PathBuf,
    events: mpsc::UnboundedReceiver<PathBuf>,
) -> WatchHandle {
    let name = spec.name.clone();
    let mut core = WatchCore::new(spec);
    core.start();

    let (state_tx, state_rx) = watch::channel(core.state());
    let (stop_tx, stop_rx) = oneshot::channel();

    let join = tokio::spawn(watch_loop(core, ctx, root, events, stop_rx, state_tx));

    WatchHandle {
        name,
        stop_tx: Some(stop_tx),
        join,
        state_rx,
        _inner: None,
    }
}

/// Result of one task run, sent back into the loop.
struct Completion {
    task: TaskName,
    generation: u64,
    result: Result<TaskReport>,
}

/// A task run currently executing on its own Tokio task.
struct ActiveRun {
    generation: u64,
    handle: JoinHandle<()>,
}

struct LoopState {
    ctx: TaskContext,
    watcher: TaskName,
    active: HashMap<TaskName, ActiveRun>,
    generation: u64,
    done_tx: mpsc::UnboundedSender<Completion>,
    summary: WatchSummary,
}

impl LoopState {
    fn dispatch(&mut self, commands: Vec<WatchCommand>) {
        for command in commands {
            let (task, events, restart) = match command {
                WatchCommand::Run { task, events } => (task, events, false),
                WatchCommand::Restart { task, events } => (task, events, true),
            };

            if restart {
                if let Some(previous) = self.active.remove(task.name()) {
                    info!(
                        watcher = %self.watcher,
                        task = %task.name(),
                        "cancelling in-flight run"
                    );
                    previous.handle.abort();
                }
            }

            if events > 0 {
                self.ctx.observer.on_event(&ProgressEvent::WatchTriggered {
                    watcher: self.watcher.clone(),
                    task: task.name().to_string(),
                    events,
                });
            }

            self.generation += 1;
            let generation = self.generation;
            let ctx = self.ctx.clone();
            let done_tx = self.done_tx.clone();
            let name = task.name().to_string();

            let handle = tokio::spawn(async move {
                let result = task.run(&ctx).await;
                let _ = done_tx.send(Completion {
                    task: task.name().to_string(),
                    generation,
                    result,
                });
            });

            self.summary.runs += 1;
            self.active.insert(name, ActiveRun { generation, handle });
        }
    }

    /// Returns `Some(task)` if the completion belongs to the current run of
    /// that task; stale completions from cancelled runs yield `None`.
    fn complete(&mut self, done: Completion) -> Option<TaskName> {
        match self.active.get(&done.task) {
            Some(run) if run.generation == done.generation => {}
            _ => {
                debug!(task = %done.task, "ignoring completion of superseded run");
                return None;
            }
        }
        self.active.remove(&done.task);

        if let Err(err) = &done.result {
            self.summary.failures += 1;
            warn!(
                watcher = %self.watcher,
                task = %done.task,
                error = %err,
                "triggered task failed; still watching"
            );
        }
        Some(done.task)
    }
}

async fn watch_loop(
    mut core: WatchCore,
    ctx: TaskContext,
    root: PathBuf,
    mut events: mpsc::UnboundedReceiver<PathBuf>,
    mut stop_rx: oneshot::Receiver<()>,
    state_tx: watch::Sender<WatchState>,
) -> WatchSummary {
    let watcher = core.spec().name.clone();
    ctx.observer.on_event(&ProgressEvent::WatchStarted {
        watcher: watcher.clone(),
        bindings: core.spec().bindings.len(),
    });

    let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
    let mut state = LoopState {
        ctx: ctx.clone(),
        watcher: watcher.clone(),
        active: HashMap::new(),
        generation: 0,
        done_tx,
        summary: WatchSummary::default(),
    };
    let mut events_open = true;

    loop {
        let deadline = core.next_deadline();

        tokio::select! {
            _ = &mut stop_rx => {
                info!(watcher = %watcher, "stop requested");
                break;
            }

            maybe_path = events.recv(), if events_open => match maybe_path {
                Some(path) => {
                    state.summary.events += 1;
                    match relative_str(&root, &path) {
                        Some(rel) => {
                            let matched = core.on_path(&rel, Instant::now());
                            debug!(watcher = %watcher, path = %rel, matched, "filesystem event");
                        }
                        None => {
                            warn!("could not relativize path {:?} against root {:?}", path, root);
                        }
                    }
                }
                None => {
                    debug!(watcher = %watcher, "event source closed");
                    events_open = false;
                }
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                let commands = core.on_tick(Instant::now());
                state.dispatch(commands);
            }

            Some(done) = done_rx.recv() => {
                if let Some(task) = state.complete(done) {
                    let commands = core.on_task_finished(&task);
                    state.dispatch(commands);
                }
            }
        }

        state_tx.send_replace(core.state());
    }

    core.stop();
    state_tx.send_replace(core.state());

    // Let in-flight runs finish; their queued reruns were dropped by `stop`.
    while !state.active.is_empty() {
        let Some(done) = done_rx.recv().await else {
            break;
        };
        if let Some(task) = state.complete(done) {
            core.on_task_finished(&task);
        }
    }

    ctx.observer
        .on_event(&ProgressEvent::WatchStopped { watcher });
    state.summary
}

/// Run a watcher until `shutdown` flips to `true` (or its sender is
/// dropped), then stop it.
pub async fn run_until_shutdown(
    spec: WatchSpec,
    ctx: TaskContext,
    mut shutdown: watch::Receiver<bool>,
) -> Result<WatchSummary> {
    let handle = spawn_watcher(spec, ctx)?;
    let _ = shutdown.wait_for(|stop| *stop).await;
    handle.stop().await
}
