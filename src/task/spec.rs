// src/task/spec.rs

//! Leaf task: resolve sources, run the transform chain, write outputs.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{PipelineError, Result};
use crate::fs::FileSystem;
use crate::observer::{Observer, ProgressEvent};
use crate::task::builtin::PassThrough;
use crate::task::pathset::PathSet;
use crate::task::transform::{Asset, Transform};
use crate::types::{EmptySourcePolicy, Mode, OverlapBehaviour, ProductionPolicy, TaskName};

/// Everything a task needs from the outside world to run.
#[derive(Clone)]
pub struct TaskContext {
    pub fs: Arc<dyn FileSystem>,
    /// Project root; source patterns are resolved against it.
    pub root: PathBuf,
    pub observer: Arc<dyn Observer>,
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("fs", &self.fs)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl TaskContext {
    fn emit(&self, event: ProgressEvent) {
        self.observer.on_event(&event);
    }
}

/// Result of one successful task run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub task: TaskName,
    pub files_written: usize,
}

/// Immutable description of a leaf task.
///
/// Built once through [`TaskSpecBuilder`] and shared (`Arc`) by the graph
/// and any watch bindings.
#[derive(Debug)]
pub struct TaskSpec {
    name: TaskName,
    sources: PathSet,
    transforms: Vec<Arc<dyn Transform>>,
    destination: PathBuf,
    on_empty: EmptySourcePolicy,
    overlap: OverlapBehaviour,
    sourcemap_dir: Option<PathBuf>,
}

impl TaskSpec {
    pub fn builder(
        name: impl Into<TaskName>,
        sources: PathSet,
        destination: impl Into<PathBuf>,
    ) -> TaskSpecBuilder {
        TaskSpecBuilder {
            name: name.into(),
            sources,
            destination: destination.into(),
            transforms: Vec::new(),
            on_empty: EmptySourcePolicy::default(),
            overlap: OverlapBehaviour::default(),
            sourcemap_dir: None,
            production: ProductionPolicy::default(),
            mode: Mode::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sources(&self) -> &PathSet {
        &self.sources
    }

    /// Destination directory, relative to the project root.
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Stage names of the effective transform chain, in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.transforms.iter().map(|t| t.name()).collect()
    }

    pub fn on_empty(&self) -> EmptySourcePolicy {
        self.on_empty
    }

    pub fn overlap(&self) -> OverlapBehaviour {
        self.overlap
    }

    pub fn sourcemap_dir(&self) -> Option<&Path> {
        self.sourcemap_dir.as_deref()
    }

    /// Run the task once.
    ///
    /// Progress (start, each written file, end or failure) is reported to
    /// `ctx.observer`. A failure while writing leaves already-written files
    /// in place; the error records how many there were.
    pub async fn run(&self, ctx: &TaskContext) -> Result<TaskReport> {
        match self.run_inner(ctx).await {
            Ok(report) => {
                ctx.emit(ProgressEvent::TaskFinished {
                    task: self.name.clone(),
                    files_written: report.files_written,
                });
                Ok(report)
            }
            Err(err) => {
                ctx.emit(ProgressEvent::TaskFailed {
                    task: self.name.clone(),
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn run_inner(&self, ctx: &TaskContext) -> Result<TaskReport> {
        let sources = self
            .sources
            .resolve(ctx.fs.as_ref(), &ctx.root)
            .map_err(|source| PipelineError::Read {
                task: self.name.clone(),
                path: ctx.root.clone(),
                source,
            })?;

        ctx.emit(ProgressEvent::TaskStarted {
            task: self.name.clone(),
            files: sources.len(),
        });

        if sources.is_empty() {
            match self.on_empty {
                EmptySourcePolicy::Succeed => {
                    debug!(task = %self.name, "no source files matched; nothing to do");
                }
                EmptySourcePolicy::Warn => {
                    warn!(
                        task = %self.name,
                        patterns = ?self.sources.patterns(),
                        "no source files matched"
                    );
                }
                EmptySourcePolicy::Fail => {
                    return Err(PipelineError::EmptySourceSet {
                        task: self.name.clone(),
                    });
                }
            }
            return Ok(TaskReport {
                task: self.name.clone(),
                files_written: 0,
            });
        }

        // Relative asset path -> original source path, for error attribution.
        let mut origins: HashMap<PathBuf, PathBuf> = HashMap::with_capacity(sources.len());
        let mut assets = Vec::with_capacity(sources.len());
        for source in sources {
            let contents = ctx
                .fs
                .read(&source.path)
                .map_err(|e| PipelineError::Read {
                    task: self.name.clone(),
                    path: source.path.clone(),
                    source: e,
                })?;
            origins.insert(source.relative.clone(), source.path);
            assets.push(Asset::new(source.relative, contents).with_origin(source.project));
        }

        for transform in &self.transforms {
            debug!(
                task = %self.name,
                stage = %transform.name(),
                assets = assets.len(),
                "applying transform"
            );
            assets = transform
                .apply(assets, &ctx.root)
                .await
                .map_err(|failure| PipelineError::Transform {
                    task: self.name.clone(),
                    stage: transform.name().to_string(),
                    file: failure
                        .file
                        .map(|f| origins.get(&f).cloned().unwrap_or(f)),
                    source: failure.source,
                })?;
        }

        let dest_dir = ctx.root.join(&self.destination);
        let mut written = 0;
        for asset in assets {
            let target = dest_dir.join(&asset.path);
            ctx.fs
                .write(&target, &asset.contents)
                .map_err(|source| PipelineError::Write {
                    task: self.name.clone(),
                    path: target.clone(),
                    written,
                    source,
                })?;

            if let (Some(map), Some(map_dir)) = (&asset.sourcemap, &self.sourcemap_dir) {
                let map_target = dest_dir.join(map_dir).join(map_file_name(&asset.path));
                ctx.fs
                    .write(&map_target, map)
                    .map_err(|source| PipelineError::Write {
                        task: self.name.clone(),
                        path: map_target.clone(),
                        written,
                        source,
                    })?;
            }

            written += 1;
            ctx.emit(ProgressEvent::FileWritten {
                task: self.name.clone(),
                path: target,
            });
        }

        Ok(TaskReport {
            task: self.name.clone(),
            files_written: written,
        })
    }
}

fn map_file_name(asset_path: &Path) -> PathBuf {
    let mut name = asset_path.as_os_str().to_owned();
    name.push(".map");
    PathBuf::from(name)
}

/// Builder for [`TaskSpec`]. Construction has no side effects.
pub struct TaskSpecBuilder {
    name: TaskName,
    sources: PathSet,
    destination: PathBuf,
    transforms: Vec<Arc<dyn Transform>>,
    on_empty: EmptySourcePolicy,
    overlap: OverlapBehaviour,
    sourcemap_dir: Option<PathBuf>,
    production: ProductionPolicy,
    mode: Mode,
}

impl TaskSpecBuilder {
    pub fn transform(mut self, transform: Arc<dyn Transform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn transforms<I>(mut self, transforms: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Transform>>,
    {
        self.transforms.extend(transforms);
        self
    }

    pub fn on_empty(mut self, policy: EmptySourcePolicy) -> Self {
        self.on_empty = policy;
        self
    }

    pub fn overlap(mut self, behaviour: OverlapBehaviour) -> Self {
        self.overlap = behaviour;
        self
    }

    /// Write sourcemaps into `<destination>/<dir>`; `None` disables them.
    pub fn sourcemaps(mut self, dir: Option<PathBuf>) -> Self {
        self.sourcemap_dir = dir;
        self
    }

    /// Declare how the transform chain changes in production, and which
    /// mode this spec is being built for.
    pub fn production(mut self, policy: ProductionPolicy, mode: Mode) -> Self {
        self.production = policy;
        self.mode = mode;
        self
    }

    pub fn build(self) -> TaskSpec {
        let transforms = match (self.production, self.mode) {
            (ProductionPolicy::Passthrough, Mode::Production) => {
                debug!(
                    task = %self.name,
                    skipped = self.transforms.len(),
                    "production mode: replacing transforms with pass-through copy"
                );
                vec![Arc::new(PassThrough) as Arc<dyn Transform>]
            }
            _ => self.transforms,
        };

        TaskSpec {
            name: self.name,
            sources: self.sources,
            transforms,
            destination: self.destination,
            on_empty: self.on_empty,
            overlap: self.overlap,
            sourcemap_dir: self.sourcemap_dir,
        }
    }
}
