// src/graph/mod.rs

//! Task graph: named leaf tasks, parallel and sequential groups, watchers.
//!
//! - [`builder`] constructs and validates a [`TaskGraph`] (no IO).
//! - [`from_config`] builds one from a validated `ConfigFile`.
//! - [`task_graph`] resolves entry names into [`Plan`]s.
//! - [`executor`] runs plans and collects a [`Report`].

pub mod builder;
pub mod executor;
pub mod from_config;
pub mod node;
pub mod report;
pub mod task_graph;

pub use builder::TaskGraphBuilder;
pub use executor::{ExecContext, execute_plan};
pub use node::{Node, Plan, Unit};
pub use report::Report;
pub use task_graph::TaskGraph;
