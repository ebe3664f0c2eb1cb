// src/task/command.rs

//! External tool transform.
//!
//! Style compilers, minifiers and image optimisers are not reimplemented;
//! each asset is piped through a shell command instead:
//!
//! - the asset contents are written to the process's stdin,
//! - stdout becomes the new contents,
//! - `{file}` in the command is replaced by the asset's source path,
//!   relative to the project root (the process's working directory),
//! - `{map}` is replaced by a temporary file path; whatever the tool writes
//!   there becomes the asset's sourcemap.

use std::path::Path;
use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::task::transform::{Asset, Transform, TransformFailure};
use crate::types::BoxFuture;

const FILE_PLACEHOLDER: &str = "{file}";
const MAP_PLACEHOLDER: &str = "{map}";

#[derive(Debug, Clone)]
pub struct CommandTransform {
    name: String,
    cmd: String,
}

impl CommandTransform {
    /// Create a command transform. The stage name defaults to the program
    /// name (first word of `cmd`).
    pub fn new(cmd: impl Into<String>, name: Option<String>) -> Self {
        let cmd = cmd.into();
        let name = name.unwrap_or_else(|| {
            cmd.split_whitespace()
                .next()
                .unwrap_or("command")
                .to_string()
        });
        Self { name, cmd }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }

    async fn run_one(&self, mut asset: Asset, root: &Path) -> Result<Asset> {
        let map_file = if self.cmd.contains(MAP_PLACEHOLDER) {
            Some(tempfile::NamedTempFile::new().context("creating sourcemap temp file")?)
        } else {
            None
        };

        // Assets without a single source (concat output) fall back to their
        // output path.
        let file = asset.origin.as_deref().unwrap_or(&asset.path);
        let mut command_line = self
            .cmd
            .replace(FILE_PLACEHOLDER, &shell_quote(&file.to_string_lossy()));
        if let Some(map) = &map_file {
            command_line =
                command_line.replace(MAP_PLACEHOLDER, &shell_quote(&map.path().to_string_lossy()));
        }

        debug!(stage = %self.name, file = ?asset.path, cmd = %command_line, "spawning transform process");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&command_line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&command_line);
            c
        };

        cmd.current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning `{}`", command_line))?;

        // Feed stdin from a separate task so a tool that streams output
        // before reading all input cannot deadlock us.
        let stdin_writer = child.stdin.take().map(|mut stdin| {
            let input = std::mem::take(&mut asset.contents);
            tokio::spawn(async move {
                let res = stdin.write_all(&input).await;
                drop(stdin);
                res
            })
        });

        let output = child
            .wait_with_output()
            .await
            .with_context(|| format!("waiting for `{}`", command_line))?;

        if let Some(writer) = stdin_writer {
            match writer.await {
                Ok(Ok(())) => {}
                // The tool may legitimately exit without reading its input.
                Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                Ok(Err(e)) => return Err(anyhow!(e).context("writing transform stdin")),
                Err(e) => return Err(anyhow!(e).context("stdin writer task panicked")),
            }
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        for line in stderr.lines() {
            debug!(stage = %self.name, file = ?asset.path, "stderr: {}", line);
        }

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let detail = stderr.trim();
            return Err(if detail.is_empty() {
                anyhow!("`{}` exited with code {}", command_line, code)
            } else {
                anyhow!("`{}` exited with code {}: {}", command_line, code, detail)
            });
        }

        asset.contents = output.stdout;

        if let Some(map) = map_file {
            let map_contents = std::fs::read(map.path())
                .with_context(|| format!("reading sourcemap from {:?}", map.path()))?;
            if !map_contents.is_empty() {
                asset.sourcemap = Some(map_contents);
            }
        }

        info!(
            stage = %self.name,
            file = ?asset.path,
            bytes = asset.contents.len(),
            "transform process finished"
        );
        Ok(asset)
    }
}

impl Transform for CommandTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        root: &'a Path,
    ) -> BoxFuture<'a, Result<Vec<Asset>, TransformFailure>> {
        Box::pin(async move {
            let mut out = Vec::with_capacity(assets.len());
            for asset in assets {
                let path = asset.path.clone();
                let transformed = self
                    .run_one(asset, root)
                    .await
                    .map_err(|e| TransformFailure::for_file(path, e))?;
                out.push(transformed);
            }
            Ok(out)
        })
    }
}

fn shell_quote(s: &str) -> String {
    if cfg!(windows) {
        format!("\"{}\"", s.replace('"', "\\\""))
    } else {
        format!("'{}'", s.replace('\'', "'\\''"))
    }
}
