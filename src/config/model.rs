// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::types::{EmptySourcePolicy, OverlapBehaviour, ProductionPolicy};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// dest = "dist"
/// default = "build"
///
/// [task.styles]
/// src = ["src/styles/**/*.scss"]
/// dest = "css"
/// transforms = [{ kind = "command", cmd = "sass --stdin" }]
///
/// [group.build]
/// parallel = ["styles", "scripts"]
///
/// [watch.watch]
/// bind = [{ task = "styles" }]
/// ```
///
/// This is the unvalidated form; convert it with `ConfigFile::try_from`.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Leaf tasks from `[task.<name>]`.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Composite entries from `[group.<name>]`.
    #[serde(default)]
    pub group: BTreeMap<String, GroupConfig>,

    /// Watch entries from `[watch.<name>]`.
    #[serde(default)]
    pub watch: BTreeMap<String, WatchConfig>,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so holders can rely on
/// every reference resolving and the group graph being acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub task: BTreeMap<String, TaskConfig>,
    pub group: BTreeMap<String, GroupConfig>,
    pub watch: BTreeMap<String, WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            task: raw.task,
            group: raw.group,
            watch: raw.watch,
        }
    }

    /// All entry names, sorted.
    pub fn entry_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .task
            .keys()
            .chain(self.group.keys())
            .chain(self.watch.keys())
            .map(String::as_str)
            .collect();
        names.sort_unstable();
        names
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Project root, relative to the directory holding the config file.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Destination root; each task's `dest` is joined onto it.
    #[serde(default = "default_dest")]
    pub dest: PathBuf,

    /// Target of the `default` alias.
    #[serde(default)]
    pub default: Option<String>,

    /// Watch coalescing window in milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// After the first leaf failure, skip leaf tasks that have not started.
    #[serde(default)]
    pub fail_fast: bool,

    /// Upper bound on concurrently running leaf tasks; `0` means unlimited.
    #[serde(default)]
    pub max_parallel: usize,

    #[serde(default = "default_true")]
    pub sourcemaps: bool,

    /// Sourcemap directory, relative to each task's destination.
    #[serde(default = "default_sourcemap_dir")]
    pub sourcemap_dir: PathBuf,

    /// Default overlap policy for watch-triggered runs.
    #[serde(default)]
    pub overlap: OverlapBehaviour,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_dest() -> PathBuf {
    PathBuf::from("dist")
}

fn default_debounce_ms() -> u64 {
    200
}

fn default_true() -> bool {
    true
}

fn default_sourcemap_dir() -> PathBuf {
    PathBuf::from("maps")
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            dest: default_dest(),
            default: None,
            debounce_ms: default_debounce_ms(),
            fail_fast: false,
            max_parallel: 0,
            sourcemaps: true,
            sourcemap_dir: default_sourcemap_dir(),
            overlap: OverlapBehaviour::default(),
        }
    }
}

impl ConfigSection {
    /// Sourcemap directory to hand to tasks, or `None` when disabled.
    pub fn effective_sourcemap_dir(&self) -> Option<&Path> {
        self.sourcemaps.then_some(self.sourcemap_dir.as_path())
    }
}

/// `[task.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    /// Source glob patterns, relative to the project root. Entries starting
    /// with `!` exclude.
    pub src: Vec<String>,

    /// Destination directory, relative to `[config].dest`. Empty means the
    /// destination root itself.
    #[serde(default)]
    pub dest: PathBuf,

    #[serde(default)]
    pub transforms: Vec<TransformConfig>,

    #[serde(default)]
    pub on_empty: EmptySourcePolicy,

    #[serde(default)]
    pub production: ProductionPolicy,

    /// Per-task override of `[config].overlap`.
    #[serde(default)]
    pub overlap: Option<OverlapBehaviour>,
}

/// One entry of a task's `transforms` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransformConfig {
    /// Write files unchanged.
    Copy,
    /// Regex replacement on the asset's relative path.
    Rename { from: String, to: String },
    /// Join all assets into `output`.
    Concat {
        output: PathBuf,
        #[serde(default)]
        separator: Option<String>,
    },
    /// Pipe each asset through a shell command.
    Command {
        cmd: String,
        #[serde(default)]
        name: Option<String>,
    },
}

/// `[group.<name>]` section. Exactly one of `parallel` / `series` is set.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    #[serde(default)]
    pub parallel: Option<Vec<String>>,

    #[serde(default)]
    pub series: Option<Vec<String>>,
}

/// Shape of a validated group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Parallel,
    Series,
}

impl GroupConfig {
    /// Kind and members. Only meaningful after validation.
    pub fn members(&self) -> (GroupKind, &[String]) {
        match (&self.parallel, &self.series) {
            (Some(units), _) => (GroupKind::Parallel, units.as_slice()),
            (None, Some(units)) => (GroupKind::Series, units.as_slice()),
            (None, None) => (GroupKind::Parallel, &[]),
        }
    }
}

/// `[watch.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Per-watcher override of `[config].debounce_ms`.
    #[serde(default)]
    pub debounce_ms: Option<u64>,

    pub bind: Vec<BindingConfig>,
}

/// `{ task = "...", patterns = [...] }` inside `[watch.<name>].bind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindingConfig {
    pub task: String,

    /// Patterns that trigger the task. Defaults to the task's `src`.
    #[serde(default)]
    pub patterns: Option<Vec<String>>,
}
