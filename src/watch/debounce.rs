// src/watch/debounce.rs

//! Trailing-edge debouncing of filesystem events per watch binding.
//!
//! Every event for a binding pushes that binding's deadline to
//! `now + window`. A binding fires once its deadline passes with no further
//! events, reporting how many events were folded into the batch. Time is
//! passed in explicitly so the logic can be tested without a clock.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
struct PendingBatch {
    deadline: Instant,
    events: usize,
}

/// A binding whose debounce window elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueBatch {
    pub binding: usize,
    pub events: usize,
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    pending: BTreeMap<usize, PendingBatch>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: BTreeMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record one event for `binding` observed at `now`.
    pub fn record(&mut self, binding: usize, now: Instant) {
        let deadline = now + self.window;
        self.pending
            .entry(binding)
            .and_modify(|batch| {
                batch.deadline = deadline;
                batch.events += 1;
            })
            .or_insert(PendingBatch {
                deadline,
                events: 1,
            });
    }

    /// Earliest deadline among pending batches.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|b| b.deadline).min()
    }

    /// Remove and return every batch whose deadline is at or before `now`,
    /// ordered by binding index.
    pub fn take_due(&mut self, now: Instant) -> Vec<DueBatch> {
        let due: Vec<usize> = self
            .pending
            .iter()
            .filter(|(_, batch)| batch.deadline <= now)
            .map(|(idx, _)| *idx)
            .collect();

        due.into_iter()
            .filter_map(|binding| {
                self.pending.remove(&binding).map(|batch| DueBatch {
                    binding,
                    events: batch.events,
                })
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
