// src/task/pathset.rs

//! Ordered glob pattern sets and their deterministic resolution.

use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};

use crate::errors::PipelineError;
use crate::fs::FileSystem;

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// A source file matched by a [`PathSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path as found on the filesystem (`root` joined with the match).
    pub path: PathBuf,
    /// Path relative to the glob base of the pattern that matched it.
    ///
    /// For `src/styles/**/*.scss`, `src/styles/a/b.scss` becomes `a/b.scss`.
    pub relative: PathBuf,
    /// Path relative to the project root, e.g. `src/styles/a/b.scss`.
    pub project: PathBuf,
}

/// One positive pattern plus its literal base directory.
#[derive(Clone)]
struct IncludePattern {
    base: PathBuf,
    matcher: GlobMatcher,
}

/// Ordered sequence of glob patterns, relative to the project root.
///
/// Entries prefixed with `!` exclude matches. Patterns are compiled when the
/// set is built; nothing touches the filesystem until [`PathSet::resolve`].
#[derive(Clone)]
pub struct PathSet {
    patterns: Vec<String>,
    includes: Vec<IncludePattern>,
    exclude: Option<GlobSet>,
}

impl fmt::Debug for PathSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathSet")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl PathSet {
    pub fn new<I, S>(patterns: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();

        let mut includes = Vec::new();
        let mut exclude_builder = GlobSetBuilder::new();
        let mut has_exclude = false;

        for raw in &patterns {
            if let Some(negated) = raw.strip_prefix('!') {
                let normalized = normalize_pattern(negated);
                exclude_builder.add(compile(raw, &normalized)?);
                has_exclude = true;
            } else {
                let normalized = normalize_pattern(raw);
                let glob = compile(raw, &normalized)?;
                includes.push(IncludePattern {
                    base: glob_base(&normalized),
                    matcher: glob.compile_matcher(),
                });
            }
        }

        let exclude = if has_exclude {
            Some(
                exclude_builder
                    .build()
                    .map_err(|e| PipelineError::PatternResolution {
                        pattern: patterns.join(", "),
                        message: e.to_string(),
                    })?,
            )
        } else {
            None
        };

        Ok(Self {
            patterns,
            includes,
            exclude,
        })
    }

    /// The patterns as declared.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// True if the set has no positive pattern (can never match anything).
    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
    }

    /// Whether a root-relative path (forward slashes) belongs to this set.
    pub fn matches(&self, rel_path: &str) -> bool {
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        self.includes.iter().any(|inc| inc.matcher.is_match(rel_path))
    }

    /// Expand the patterns against `root`.
    ///
    /// The result is sorted by path so that output order (and anything
    /// derived from it, such as concatenation) is reproducible. A file
    /// matched by several patterns takes the base of the first one.
    pub fn resolve(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<SourceFile>> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut files = Vec::new();

        for include in &self.includes {
            let start = if include.base.as_os_str().is_empty() {
                root.to_path_buf()
            } else {
                root.join(&include.base)
            };
            if !fs.is_dir(&start) {
                continue;
            }

            let mut stack = vec![start];
            while let Some(dir) = stack.pop() {
                for path in fs.read_dir(&dir)? {
                    if fs.is_dir(&path) {
                        // Linked directories are not descended into; a link
                        // back to an ancestor would never terminate.
                        if !fs.is_symlink(&path) {
                            stack.push(path);
                        }
                        continue;
                    }
                    if !fs.is_file(&path) || seen.contains(&path) {
                        continue;
                    }
                    let Some(rel_str) = root_relative(root, &path) else {
                        continue;
                    };
                    if !include.matcher.is_match(&rel_str) {
                        continue;
                    }
                    if let Some(exclude) = &self.exclude {
                        if exclude.is_match(&rel_str) {
                            continue;
                        }
                    }

                    let relative = Path::new(&rel_str)
                        .strip_prefix(&include.base)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|_| PathBuf::from(&rel_str));

                    seen.insert(path.clone());
                    files.push(SourceFile {
                        path,
                        relative,
                        project: PathBuf::from(rel_str),
                    });
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

fn compile(raw: &str, normalized: &str) -> Result<globset::Glob, PipelineError> {
    GlobBuilder::new(normalized)
        .literal_separator(true)
        .build()
        .map_err(|e| PipelineError::PatternResolution {
            pattern: raw.to_string(),
            message: e.to_string(),
        })
}

fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim();
    trimmed.strip_prefix("./").unwrap_or(trimmed).to_string()
}

/// Literal directory prefix of a pattern: every component before the first
/// one containing a glob metacharacter. A pattern without metacharacters
/// names a single file, whose base is its parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let path = Path::new(pattern);
    let mut base = PathBuf::new();
    let mut has_meta = false;

    for component in path.components() {
        let Component::Normal(part) = component else {
            continue;
        };
        if part.to_string_lossy().contains(GLOB_META) {
            has_meta = true;
            break;
        }
        base.push(part);
    }

    if has_meta {
        base
    } else {
        base.parent().map(Path::to_path_buf).unwrap_or_default()
    }
}

fn root_relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
