// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod fs;
pub mod graph;
pub mod logging;
pub mod observer;
pub mod runner;
pub mod task;
pub mod types;
pub mod watch;

use std::path::PathBuf;

use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, project_root};
use crate::errors::Result;
use crate::graph::Report;
use crate::runner::Runner;

/// High-level entry point used by `main.rs`.
///
/// Loads and validates the config, resolves the build mode once, builds the
/// graph and then lists it, prints the resolved plan (`--dry-run`) or runs
/// it. Returns `Ok(None)` when nothing was executed.
pub async fn run(args: CliArgs) -> Result<Option<Report>> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let mode = args.resolve_mode();
    let root = project_root(&config_path, &cfg);
    info!(?mode, root = ?root, config = ?config_path, "configuration loaded");

    let runner = Runner::from_config(&cfg, root, mode)?;

    if args.list {
        print_list(&runner);
        return Ok(None);
    }

    if args.dry_run {
        let plan = runner.graph().resolve(&args.task)?;
        println!("assetpipe dry-run ({:?})", mode);
        print!("{}", plan.describe());
        debug!("dry-run complete (no execution)");
        return Ok(None);
    }

    runner.run(&args.task).await.map(Some)
}

fn print_list(runner: &Runner) {
    let graph = runner.graph();
    for (name, kind) in graph.entries() {
        println!("{name} ({kind})");
    }
    if let Some(target) = graph.default_target() {
        println!("default -> {target}");
    }
}
