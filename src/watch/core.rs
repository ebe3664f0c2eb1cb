// src/watch/core.rs

//! Pure watch state machine.
//!
//! `WatchCore` consumes path changes, clock ticks and task completions and
//! returns [`WatchCommand`]s describing which task runs to start or restart.
//! It owns no channels, spawns nothing and reads no clock; the async shell in
//! [`crate::watch::watcher`] does all of that.
//!
//! States: `Idle -> Watching -> Triggering -> Watching`, and `Stopped`
//! once [`WatchCore::stop`] is called.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, trace};

use crate::task::TaskSpec;
use crate::watch::binding::WatchSpec;
use crate::watch::debounce::Debouncer;
use crate::watch::flight::{FlightDecision, FlightTracker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    /// Listening; no task run in flight.
    Watching,
    /// At least one bound task is running.
    Triggering,
    Stopped,
}

/// Instruction for the async shell.
#[derive(Debug, Clone)]
pub enum WatchCommand {
    /// Start a run of `task`; `events` is the number of coalesced
    /// filesystem events behind it (0 for a queued rerun).
    Run { task: Arc<TaskSpec>, events: usize },
    /// Abort the in-flight run of `task` and start a new one.
    Restart { task: Arc<TaskSpec>, events: usize },
}

impl WatchCommand {
    pub fn task(&self) -> &Arc<TaskSpec> {
        match self {
            WatchCommand::Run { task, .. } | WatchCommand::Restart { task, .. } => task,
        }
    }
}

#[derive(Debug)]
pub struct WatchCore {
    spec: WatchSpec,
    debouncer: Debouncer,
    flights: FlightTracker,
    state: WatchState,
}

impl WatchCore {
    pub fn new(spec: WatchSpec) -> Self {
        let debouncer = Debouncer::new(spec.debounce);
        Self {
            spec,
            debouncer,
            flights: FlightTracker::new(),
            state: WatchState::Idle,
        }
    }

    pub fn spec(&self) -> &WatchSpec {
        &self.spec
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    pub fn start(&mut self) {
        if self.state == WatchState::Idle {
            self.state = WatchState::Watching;
        }
    }

    /// Earliest pending debounce deadline, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.state == WatchState::Stopped {
            return None;
        }
        self.debouncer.next_deadline()
    }

    /// Number of task runs currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.in_flight()
    }

    /// Feed one changed path (relative to the project root, forward
    /// slashes). Returns how many bindings it matched.
    pub fn on_path(&mut self, rel_path: &str, now: Instant) -> usize {
        if !self.accepting() {
            return 0;
        }

        let mut matched = 0;
        for (idx, binding) in self.spec.bindings.iter().enumerate() {
            if binding.matches(rel_path) {
                trace!(
                    watcher = %self.spec.name,
                    task = %binding.task().name(),
                    path = %rel_path,
                    "path matched watch binding"
                );
                self.debouncer.record(idx, now);
                matched += 1;
            }
        }
        matched
    }

    /// Fire every binding whose debounce window has elapsed by `now`.
    ///
    /// Bindings that share a task collapse into one request for it.
    pub fn on_tick(&mut self, now: Instant) -> Vec<WatchCommand> {
        if !self.accepting() {
            return Vec::new();
        }

        let mut commands = Vec::new();
        let mut requested: HashSet<String> = HashSet::new();

        for batch in self.debouncer.take_due(now) {
            let Some(binding) = self.spec.bindings.get(batch.binding) else {
                continue;
            };
            let task = Arc::clone(binding.task());
            if !requested.insert(task.name().to_string()) {
                continue;
            }

            match self.flights.request(task.name(), task.overlap()) {
                FlightDecision::Start => commands.push(WatchCommand::Run {
                    task,
                    events: batch.events,
                }),
                FlightDecision::Restart => commands.push(WatchCommand::Restart {
                    task,
                    events: batch.events,
                }),
                FlightDecision::Queued | FlightDecision::Coalesced => {}
            }
        }

        self.refresh_state();
        commands
    }

    /// Record that a run of `task` ended (successfully or not).
    pub fn on_task_finished(&mut self, task: &str) -> Vec<WatchCommand> {
        let mut commands = Vec::new();

        if self.flights.finish(task) {
            if self.state == WatchState::Stopped {
                // Shutting down: the queued rerun is dropped.
                self.flights.finish(task);
            } else if let Some(spec) = self.task_by_name(task) {
                debug!(watcher = %self.spec.name, task = %task, "starting queued rerun");
                commands.push(WatchCommand::Run {
                    task: spec,
                    events: 0,
                });
            }
        }

        self.refresh_state();
        commands
    }

    /// Enter `Stopped`: pending debounce batches and queued reruns are
    /// discarded. In-flight runs are still tracked until they finish.
    pub fn stop(&mut self) {
        self.debouncer.clear();
        let dropped = self.flights.drop_pending();
        if dropped > 0 {
            debug!(watcher = %self.spec.name, dropped, "dropped queued reruns on stop");
        }
        self.state = WatchState::Stopped;
    }

    fn accepting(&self) -> bool {
        matches!(self.state, WatchState::Watching | WatchState::Triggering)
    }

    fn refresh_state(&mut self) {
        if self.state == WatchState::Stopped || self.state == WatchState::Idle {
            return;
        }
        self.state = if self.flights.is_idle() {
            WatchState::Watching
        } else {
            WatchState::Triggering
        };
    }

    fn task_by_name(&self, name: &str) -> Option<Arc<TaskSpec>> {
        self.spec
            .bindings
            .iter()
            .find(|b| b.task().name() == name)
            .map(|b| Arc::clone(b.task()))
    }
}
