// src/watch/flight.rs

//! Single-flight bookkeeping: at most one run per task at a time.

use std::collections::HashMap;

use tracing::debug;

use crate::types::{OverlapBehaviour, TaskName};

/// What the caller should do with a run request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightDecision {
    /// Task was idle; start it now.
    Start,
    /// Task is running; a rerun was queued for when it finishes.
    Queued,
    /// Task is running and a rerun is already queued; nothing to add.
    Coalesced,
    /// Task is running under `cancel`; abort it and start a fresh run.
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    rerun_pending: bool,
}

#[derive(Debug, Default)]
pub struct FlightTracker {
    running: HashMap<TaskName, InFlight>,
}

impl FlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask to run `task`.
    ///
    /// - Idle task: marked running, `Start`.
    /// - Running, `Queue`: one rerun is remembered; further requests during
    ///   the same run coalesce into it.
    /// - Running, `Cancel`: `Restart`; any queued rerun is dropped since the
    ///   fresh run supersedes it.
    pub fn request(&mut self, task: &str, behaviour: OverlapBehaviour) -> FlightDecision {
        let Some(state) = self.running.get_mut(task) else {
            self.running.insert(
                task.to_string(),
                InFlight {
                    rerun_pending: false,
                },
            );
            return FlightDecision::Start;
        };

        match behaviour {
            OverlapBehaviour::Queue if state.rerun_pending => {
                debug!(task = %task, "run already queued; coalescing trigger");
                FlightDecision::Coalesced
            }
            OverlapBehaviour::Queue => {
                state.rerun_pending = true;
                debug!(task = %task, "task in flight; queued one rerun");
                FlightDecision::Queued
            }
            OverlapBehaviour::Cancel => {
                state.rerun_pending = false;
                debug!(task = %task, "task in flight; restarting (cancel mode)");
                FlightDecision::Restart
            }
        }
    }

    /// Record that the current run of `task` ended.
    ///
    /// Returns `true` if a queued rerun should start now (the task stays
    /// marked as running); `false` if the task is now idle.
    pub fn finish(&mut self, task: &str) -> bool {
        match self.running.get_mut(task) {
            Some(state) if state.rerun_pending => {
                state.rerun_pending = false;
                true
            }
            Some(_) => {
                self.running.remove(task);
                false
            }
            None => false,
        }
    }

    pub fn is_running(&self, task: &str) -> bool {
        self.running.contains_key(task)
    }

    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    pub fn is_idle(&self) -> bool {
        self.running.is_empty()
    }

    /// Forget every queued rerun, keeping in-flight runs tracked.
    pub fn drop_pending(&mut self) -> usize {
        let mut dropped = 0;
        for state in self.running.values_mut() {
            if state.rerun_pending {
                state.rerun_pending = false;
                dropped += 1;
            }
        }
        dropped
    }
}
