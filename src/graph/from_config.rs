// src/graph/from_config.rs

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::{ConfigFile, GroupKind, TaskConfig, TransformConfig};
use crate::errors::{PipelineError, Result};
use crate::graph::builder::TaskGraphBuilder;
use crate::graph::task_graph::TaskGraph;
use crate::task::{CommandTransform, Concat, PassThrough, PathSet, Rename, TaskSpec, Transform};
use crate::types::Mode;
use crate::watch::WatchBinding;

impl TaskGraph {
    /// Build the graph described by a validated config for one build mode.
    ///
    /// Glob patterns are compiled here; an invalid one fails with
    /// `PatternResolution`. Nothing touches the filesystem.
    pub fn from_config(cfg: &ConfigFile, mode: Mode) -> Result<TaskGraph> {
        let mut builder = TaskGraphBuilder::new();
        let mut specs: HashMap<&str, Arc<TaskSpec>> = HashMap::new();

        for (name, task) in cfg.task.iter() {
            let spec = Arc::new(task_spec(cfg, name, task, mode)?);
            specs.insert(name.as_str(), spec.clone());
            builder = builder.task(spec);
        }

        for (name, group) in cfg.group.iter() {
            let (kind, members) = group.members();
            builder = match kind {
                GroupKind::Parallel => builder.parallel(name.as_str(), members),
                GroupKind::Series => builder.series(name.as_str(), members),
            };
        }

        for (name, watch) in cfg.watch.iter() {
            let mut bindings = Vec::with_capacity(watch.bind.len());
            for bind in watch.bind.iter() {
                let task = specs
                    .get(bind.task.as_str())
                    .cloned()
                    .ok_or_else(|| PipelineError::UnknownTask(bind.task.clone()))?;
                let binding = match &bind.patterns {
                    Some(patterns) => WatchBinding::new(PathSet::new(patterns)?, task),
                    None => WatchBinding::for_task(task),
                };
                bindings.push(binding);
            }
            let debounce = Duration::from_millis(watch.debounce_ms.unwrap_or(cfg.config.debounce_ms));
            builder = builder.watch(name.as_str(), debounce, bindings);
        }

        if let Some(default) = &cfg.config.default {
            builder = builder.default_task(default.as_str());
        }

        let graph = builder.build()?;
        debug!(?mode, entries = graph.names().count(), "graph built from config");
        Ok(graph)
    }
}

fn task_spec(cfg: &ConfigFile, name: &str, task: &TaskConfig, mode: Mode) -> Result<TaskSpec> {
    let sources = PathSet::new(&task.src)?;

    let destination: PathBuf = if task.dest.as_os_str().is_empty() {
        cfg.config.dest.clone()
    } else {
        cfg.config.dest.join(&task.dest)
    };

    let transforms = task
        .transforms
        .iter()
        .map(|t| build_transform(name, t))
        .collect::<Result<Vec<_>>>()?;

    Ok(TaskSpec::builder(name, sources, destination)
        .transforms(transforms)
        .on_empty(task.on_empty)
        .overlap(task.overlap.unwrap_or(cfg.config.overlap))
        .sourcemaps(cfg.config.effective_sourcemap_dir().map(PathBuf::from))
        .production(task.production, mode)
        .build())
}

fn build_transform(task: &str, cfg: &TransformConfig) -> Result<Arc<dyn Transform>> {
    let transform: Arc<dyn Transform> = match cfg {
        TransformConfig::Copy => Arc::new(PassThrough),
        TransformConfig::Rename { from, to } => {
            let rename = Rename::new(from, to.as_str()).map_err(|e| {
                PipelineError::ConfigError(format!(
                    "task '{}': invalid rename pattern '{}': {}",
                    task, from, e
                ))
            })?;
            Arc::new(rename)
        }
        TransformConfig::Concat { output, separator } => {
            let concat = Concat::new(output.clone());
            match separator {
                Some(sep) => Arc::new(concat.with_separator(sep.as_str())),
                None => Arc::new(concat),
            }
        }
        TransformConfig::Command { cmd, name } => {
            Arc::new(CommandTransform::new(cmd.as_str(), name.clone()))
        }
    };
    Ok(transform)
}
