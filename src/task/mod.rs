// src/task/mod.rs

//! Leaf units of work.
//!
//! - [`pathset`] compiles and resolves source glob patterns.
//! - [`transform`] defines the `Transform` trait and the `Asset` type.
//! - [`builtin`] holds in-process transforms (copy, rename, concat).
//! - [`command`] pipes assets through external tools.
//! - [`spec`] ties them together into a runnable `TaskSpec`.

pub mod builtin;
pub mod command;
pub mod pathset;
pub mod spec;
pub mod transform;

pub use builtin::{Concat, PassThrough, Rename};
pub use command::CommandTransform;
pub use pathset::{PathSet, SourceFile};
pub use spec::{TaskContext, TaskReport, TaskSpec, TaskSpecBuilder};
pub use transform::{Asset, Transform, TransformFailure};
