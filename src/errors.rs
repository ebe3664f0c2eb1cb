// src/errors.rs

//! Crate-wide error taxonomy.
//!
//! Leaf failures (`Transform`, `Write`, `Read`, `EmptySourceSet`) carry the
//! task name and, where one exists, the offending file. Group failures wrap
//! their members: parallel groups keep every failure, sequential groups keep
//! the single failing step.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::TaskName;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("invalid glob pattern '{pattern}': {message}")]
    PatternResolution { pattern: String, message: String },

    #[error("task '{task}': stage '{stage}' failed{}: {source:#}", file_suffix(.file))]
    Transform {
        task: TaskName,
        stage: String,
        file: Option<PathBuf>,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "task '{task}': cannot write {path:?} ({written} file(s) already written): {source:#}"
    )]
    Write {
        task: TaskName,
        path: PathBuf,
        written: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("task '{task}': cannot read source {path:?}: {source:#}")]
    Read {
        task: TaskName,
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("task '{task}': source patterns matched no files")]
    EmptySourceSet { task: TaskName },

    #[error("cycle detected in task graph involving '{0}'")]
    Cycle(String),

    #[error("group '{group}': {} of {total} unit(s) failed", .failures.len())]
    Parallel {
        group: TaskName,
        total: usize,
        failures: Vec<PipelineError>,
    },

    #[error("group '{group}': step {index} ('{step}') aborted the sequence: {source}")]
    SequenceAborted {
        group: TaskName,
        step: TaskName,
        index: usize,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("watcher '{watcher}': {source:#}")]
    Watch {
        watcher: TaskName,
        #[source]
        source: anyhow::Error,
    },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn file_suffix(file: &Option<PathBuf>) -> String {
    match file {
        Some(path) => format!(" on {:?}", path),
        None => String::new(),
    }
}

impl PipelineError {
    /// Flatten composite errors into the leaf failures they contain.
    ///
    /// A parallel group contributes every member failure; an aborted sequence
    /// contributes the failing step's leaves. Non-composite errors return
    /// themselves.
    pub fn leaf_errors(&self) -> Vec<&PipelineError> {
        match self {
            PipelineError::Parallel { failures, .. } => {
                failures.iter().flat_map(|f| f.leaf_errors()).collect()
            }
            PipelineError::SequenceAborted { source, .. } => source.leaf_errors(),
            other => vec![other],
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PipelineError>;
