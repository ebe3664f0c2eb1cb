// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{PipelineError, Result};

/// Name that always refers to `[config].default`; it cannot be declared.
pub const DEFAULT_ALIAS: &str = "default";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PipelineError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_global_config(cfg)?;
    validate_names(cfg)?;
    validate_tasks(cfg)?;
    validate_groups(cfg)?;
    validate_watches(cfg)?;
    validate_default(cfg)?;
    validate_group_graph(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(PipelineError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.sourcemap_dir.is_absolute() {
        return Err(PipelineError::ConfigError(format!(
            "[config].sourcemap_dir must be relative (got {:?})",
            cfg.config.sourcemap_dir
        )));
    }
    Ok(())
}

fn validate_names(cfg: &RawConfigFile) -> Result<()> {
    let mut seen: HashSet<&str> = HashSet::new();
    let tables = [
        ("task", cfg.task.keys().collect::<Vec<_>>()),
        ("group", cfg.group.keys().collect()),
        ("watch", cfg.watch.keys().collect()),
    ];

    for (table, names) in tables {
        for name in names {
            if name == DEFAULT_ALIAS {
                return Err(PipelineError::ConfigError(format!(
                    "[{}.{}]: '{}' is reserved for the [config].default alias",
                    table, name, DEFAULT_ALIAS
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::ConfigError(format!(
                    "name '{}' is declared more than once across [task], [group] and [watch]",
                    name
                )));
            }
        }
    }
    Ok(())
}

fn validate_tasks(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        if task.dest.is_absolute() {
            return Err(PipelineError::ConfigError(format!(
                "task '{}': dest must be relative to [config].dest (got {:?})",
                name, task.dest
            )));
        }
        for transform in task.transforms.iter() {
            if let crate::config::model::TransformConfig::Rename { from, .. } = transform {
                regex::Regex::new(from).map_err(|e| {
                    PipelineError::ConfigError(format!(
                        "task '{}': invalid rename pattern '{}': {}",
                        name, from, e
                    ))
                })?;
            }
        }
    }
    Ok(())
}

fn validate_groups(cfg: &RawConfigFile) -> Result<()> {
    for (name, group) in cfg.group.iter() {
        let members = match (&group.parallel, &group.series) {
            (Some(_), Some(_)) => {
                return Err(PipelineError::ConfigError(format!(
                    "group '{}' sets both `parallel` and `series`",
                    name
                )));
            }
            (None, None) => {
                return Err(PipelineError::ConfigError(format!(
                    "group '{}' must set one of `parallel` or `series`",
                    name
                )));
            }
            (Some(units), None) | (None, Some(units)) => units,
        };

        if members.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "group '{}' has no members",
                name
            )));
        }

        for member in members {
            if !is_declared(cfg, member) {
                return Err(PipelineError::ConfigError(format!(
                    "group '{}' references unknown entry '{}'",
                    name, member
                )));
            }
        }
    }
    Ok(())
}

fn validate_watches(cfg: &RawConfigFile) -> Result<()> {
    for (name, watch) in cfg.watch.iter() {
        if watch.bind.is_empty() {
            return Err(PipelineError::ConfigError(format!(
                "watch '{}' has no bindings",
                name
            )));
        }

        for binding in watch.bind.iter() {
            let Some(task) = cfg.task.get(&binding.task) else {
                let what = if is_declared(cfg, &binding.task) {
                    "is not a leaf task"
                } else {
                    "does not exist"
                };
                return Err(PipelineError::ConfigError(format!(
                    "watch '{}' binds '{}', which {}",
                    name, binding.task, what
                )));
            };

            let has_patterns = match &binding.patterns {
                Some(patterns) => !patterns.is_empty(),
                None => !task.src.is_empty(),
            };
            if !has_patterns {
                return Err(PipelineError::ConfigError(format!(
                    "watch '{}': binding for '{}' has no patterns",
                    name, binding.task
                )));
            }
        }
    }
    Ok(())
}

fn validate_default(cfg: &RawConfigFile) -> Result<()> {
    if let Some(target) = &cfg.config.default {
        if !is_declared(cfg, target) {
            return Err(PipelineError::ConfigError(format!(
                "[config].default references unknown entry '{}'",
                target
            )));
        }
    }
    Ok(())
}

fn validate_group_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: group -> member.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.group.keys() {
        graph.add_node(name.as_str());
    }

    for (name, group) in cfg.group.iter() {
        let (_, members) = group.members();
        for member in members {
            graph.add_edge(name.as_str(), member.as_str(), ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PipelineError::Cycle(cycle.node_id().to_string())),
    }
}

fn is_declared(cfg: &RawConfigFile, name: &str) -> bool {
    cfg.task.contains_key(name) || cfg.group.contains_key(name) || cfg.watch.contains_key(name)
}
