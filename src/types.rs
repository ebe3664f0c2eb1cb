use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::Deserialize;

/// Boxed, `Send` future used at the async trait seams (transforms, observers).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Canonical name type for graph entries (tasks, groups, watchers).
pub type TaskName = String;

/// Build environment, resolved once before the graph is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    /// Resolve the mode from process environment variables.
    ///
    /// Checked in order:
    /// 1. `ASSETPIPE_ENV` (`development` / `production`)
    /// 2. `NODE_ENV == "production"`
    /// 3. a non-empty `VERCEL` variable (hosted builds)
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Same as [`Mode::from_env`] but with an injectable lookup, so the
    /// branch can be exercised without touching the real environment.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("ASSETPIPE_ENV").and_then(|v| v.parse().ok()) {
            return mode;
        }

        if lookup("NODE_ENV").is_some_and(|v| v.trim().eq_ignore_ascii_case("production")) {
            return Mode::Production;
        }

        if lookup("VERCEL").is_some_and(|v| !v.trim().is_empty()) {
            return Mode::Production;
        }

        Mode::Development
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Mode::Development),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(format!(
                "invalid mode: {other} (expected \"development\" or \"production\")"
            )),
        }
    }
}

/// What a task does when its source patterns match zero files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmptySourcePolicy {
    /// Succeed with `files_written = 0`.
    #[default]
    Succeed,
    /// Succeed, but log a warning.
    Warn,
    /// Fail with `PipelineError::EmptySourceSet`.
    Fail,
}

/// How a task's transform chain is chosen in production mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProductionPolicy {
    /// Run the declared transforms in every mode.
    #[default]
    Full,
    /// In production, replace the declared transforms with a plain copy.
    Passthrough,
}

/// Behaviour when a watch trigger arrives while the bound task is still
/// running.
///
/// - `Queue`: remember the trigger and run the task again once the current
///   run finishes. Any number of triggers during one run collapse into a
///   single queued rerun.
/// - `Cancel`: abort the in-flight run and start a fresh one immediately.
///
/// Both keep at most one execution per task in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverlapBehaviour {
    #[default]
    Queue,
    Cancel,
}

impl FromStr for OverlapBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(OverlapBehaviour::Queue),
            "cancel" => Ok(OverlapBehaviour::Cancel),
            other => Err(format!(
                "invalid overlap behaviour: {other} (expected \"queue\" or \"cancel\")"
            )),
        }
    }
}
