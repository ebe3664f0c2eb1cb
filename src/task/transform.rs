// src/task/transform.rs

//! The transform abstraction.
//!
//! A transform is an opaque step (compile, minify, optimise, concatenate,
//! rename) applied to the whole in-memory file set of a task. Each transform
//! consumes the previous one's output. Production implementations live in
//! [`crate::task::builtin`] and [`crate::task::command`]; tests provide
//! their own.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::BoxFuture;

/// A file flowing through a transform chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Output path relative to the task destination.
    pub path: PathBuf,
    pub contents: Vec<u8>,
    /// Sourcemap produced by some earlier stage, if any.
    pub sourcemap: Option<Vec<u8>>,
    /// Project-relative path of the source file this asset was read from.
    /// Survives renames; `None` for assets built from several files.
    pub origin: Option<PathBuf>,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
            sourcemap: None,
            origin: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }
}

/// Why a transform failed, optionally pinned to a single file.
///
/// The task wraps this into `PipelineError::Transform`, adding its own name
/// and the stage name.
#[derive(Debug)]
pub struct TransformFailure {
    pub file: Option<PathBuf>,
    pub source: anyhow::Error,
}

impl TransformFailure {
    pub fn for_file(file: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self {
            file: Some(file.into()),
            source,
        }
    }

    pub fn whole_set(source: anyhow::Error) -> Self {
        Self { file: None, source }
    }
}

impl fmt::Display for TransformFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{:?}: {:#}", file, self.source),
            None => write!(f, "{:#}", self.source),
        }
    }
}

/// Trait abstracting a single stage of a task's pipeline.
///
/// Implementations must be shareable across concurrently running tasks;
/// the same transform instance may be used by several task runs.
pub trait Transform: Send + Sync + fmt::Debug {
    /// Stage name used in diagnostics (e.g. `"sass"`, `"concat"`).
    fn name(&self) -> &str;

    /// Transform the whole set. `root` is the project root; tools that
    /// resolve paths on their own run from there.
    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        root: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<Asset>, TransformFailure>>;
}
