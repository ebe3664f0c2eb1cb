#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use assetpipe::config::{
    BindingConfig, ConfigFile, ConfigSection, GroupConfig, RawConfigFile, TaskConfig,
    TransformConfig, WatchConfig,
};
use assetpipe::errors::Result;
use assetpipe::task::{PathSet, TaskSpec, Transform};
use assetpipe::types::{EmptySourcePolicy, OverlapBehaviour, ProductionPolicy};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
                group: BTreeMap::new(),
                watch: BTreeMap::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_parallel(mut self, name: &str, members: &[&str]) -> Self {
        self.config.group.insert(
            name.to_string(),
            GroupConfig {
                parallel: Some(members.iter().map(|m| m.to_string()).collect()),
                series: None,
            },
        );
        self
    }

    pub fn with_series(mut self, name: &str, members: &[&str]) -> Self {
        self.config.group.insert(
            name.to_string(),
            GroupConfig {
                parallel: None,
                series: Some(members.iter().map(|m| m.to_string()).collect()),
            },
        );
        self
    }

    pub fn with_group(mut self, name: &str, group: GroupConfig) -> Self {
        self.config.group.insert(name.to_string(), group);
        self
    }

    /// Watcher binding each task to its own sources.
    pub fn with_watch(mut self, name: &str, tasks: &[&str]) -> Self {
        self.config.watch.insert(
            name.to_string(),
            WatchConfig {
                debounce_ms: None,
                bind: tasks
                    .iter()
                    .map(|t| BindingConfig {
                        task: t.to_string(),
                        patterns: None,
                    })
                    .collect(),
            },
        );
        self
    }

    pub fn with_watch_config(mut self, name: &str, watch: WatchConfig) -> Self {
        self.config.watch.insert(name.to_string(), watch);
        self
    }

    pub fn default_task(mut self, name: &str) -> Self {
        self.config.config.default = Some(name.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.config.config.dest = PathBuf::from(dest);
        self
    }

    pub fn fail_fast(mut self, val: bool) -> Self {
        self.config.config.fail_fast = val;
        self
    }

    pub fn max_parallel(mut self, val: usize) -> Self {
        self.config.config.max_parallel = val;
        self
    }

    pub fn sourcemaps(mut self, enabled: bool, dir: &str) -> Self {
        self.config.config.sourcemaps = enabled;
        self.config.config.sourcemap_dir = PathBuf::from(dir);
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn new(src: &str) -> Self {
        Self {
            task: TaskConfig {
                src: vec![src.to_string()],
                dest: PathBuf::new(),
                transforms: vec![],
                on_empty: EmptySourcePolicy::default(),
                production: ProductionPolicy::default(),
                overlap: None,
            },
        }
    }

    pub fn src(mut self, pattern: &str) -> Self {
        self.task.src.push(pattern.to_string());
        self
    }

    pub fn dest(mut self, dest: &str) -> Self {
        self.task.dest = PathBuf::from(dest);
        self
    }

    pub fn transform(mut self, transform: TransformConfig) -> Self {
        self.task.transforms.push(transform);
        self
    }

    pub fn copy(self) -> Self {
        self.transform(TransformConfig::Copy)
    }

    pub fn rename(self, from: &str, to: &str) -> Self {
        self.transform(TransformConfig::Rename {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    pub fn concat(self, output: &str) -> Self {
        self.transform(TransformConfig::Concat {
            output: PathBuf::from(output),
            separator: None,
        })
    }

    pub fn command(self, cmd: &str) -> Self {
        self.transform(TransformConfig::Command {
            cmd: cmd.to_string(),
            name: None,
        })
    }

    pub fn on_empty(mut self, policy: EmptySourcePolicy) -> Self {
        self.task.on_empty = policy;
        self
    }

    pub fn production(mut self, policy: ProductionPolicy) -> Self {
        self.task.production = policy;
        self
    }

    pub fn overlap(mut self, behaviour: OverlapBehaviour) -> Self {
        self.task.overlap = Some(behaviour);
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }
}

/// Leaf task over `patterns` writing to `dest`, with the given chain.
pub fn leaf_task(
    name: &str,
    patterns: &[&str],
    dest: &str,
    transforms: Vec<Arc<dyn Transform>>,
) -> TaskSpec {
    let sources = PathSet::new(patterns.iter().copied()).expect("valid test patterns");
    TaskSpec::builder(name, sources, dest)
        .transforms(transforms)
        .build()
}
