// src/task/builtin.rs

//! In-process transforms that need no external tool.

use std::path::{Path, PathBuf};

use anyhow::anyhow;
use regex::Regex;
use tracing::debug;

use crate::task::transform::{Asset, Transform, TransformFailure};
use crate::types::BoxFuture;

/// Copies assets unchanged. Used for plain copy tasks and as the
/// production substitute for tasks declared `production = "passthrough"`.
#[derive(Debug, Clone, Default)]
pub struct PassThrough;

impl Transform for PassThrough {
    fn name(&self) -> &str {
        "copy"
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        _root: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<Asset>, TransformFailure>> {
        Box::pin(async move { Ok(assets) })
    }
}

/// Rewrites each asset's relative path with a regex replacement
/// (`\.scss$` -> `.css`, `\.js$` -> `.min.js`).
#[derive(Debug, Clone)]
pub struct Rename {
    from: Regex,
    to: String,
}

impl Rename {
    pub fn new(from: &str, to: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            from: Regex::new(from)?,
            to: to.into(),
        })
    }

    fn rename(&self, path: &Path) -> PathBuf {
        let original = path.to_string_lossy().replace('\\', "/");
        PathBuf::from(self.from.replace(&original, self.to.as_str()).into_owned())
    }
}

impl Transform for Rename {
    fn name(&self) -> &str {
        "rename"
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        _root: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<Asset>, TransformFailure>> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(assets.len());
            for mut asset in assets {
                let renamed = self.rename(&asset.path);
                if renamed.as_os_str().is_empty() {
                    return Err(TransformFailure::for_file(
                        asset.path,
                        anyhow!("rename produced an empty path"),
                    ));
                }
                debug!(from = ?asset.path, to = ?renamed, "renamed asset");
                asset.path = renamed;
                out.push(asset);
            }
            Ok(out)
        })
    }
}

/// Joins every asset, in order, into a single output file.
///
/// Input sourcemaps are dropped; a bundling stage that needs a map should
/// be followed by a command transform that produces one.
#[derive(Debug, Clone)]
pub struct Concat {
    output: PathBuf,
    separator: String,
}

impl Concat {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            separator: "\n".to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

impl Transform for Concat {
    fn name(&self) -> &str {
        "concat"
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        _root: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<Asset>, TransformFailure>> {
        Box::pin(async move {
            if assets.is_empty() {
                return Ok(Vec::new());
            }

            let mut contents = Vec::new();
            for (idx, asset) in assets.iter().enumerate() {
                if idx > 0 {
                    contents.extend_from_slice(self.separator.as_bytes());
                }
                contents.extend_from_slice(&asset.contents);
            }

            debug!(
                inputs = assets.len(),
                output = ?self.output,
                "concatenated assets"
            );
            Ok(vec![Asset::new(self.output.clone(), contents)])
        })
    }
}
