// src/watch/mod.rs

//! Watch mode.
//!
//! This module is responsible for:
//! - Binding glob patterns to the leaf tasks they re-run.
//! - Debouncing bursts of filesystem events per binding.
//! - Keeping at most one run per task in flight (queue or cancel overlap).
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//!
//! The decision logic lives in [`core::WatchCore`] and is free of IO; the
//! [`watcher`] module is the async shell that feeds it events and spawns
//! task runs.

pub mod binding;
pub mod core;
pub mod debounce;
pub mod flight;
pub mod path_utils;
pub mod watcher;

pub use binding::{WatchBinding, WatchSpec};
pub use self::core::{WatchCommand, WatchCore, WatchState};
pub use debounce::{Debouncer, DueBatch};
pub use flight::{FlightDecision, FlightTracker};
pub use watcher::{
    WatchHandle, WatchSummary, run_until_shutdown, spawn_watcher, spawn_watcher_with_events,
};
