// src/config/mod.rs

//! `Assetpipe.toml` model, loading and validation.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{DEFAULT_CONFIG_FILE, load_and_validate, load_from_path, parse_str, project_root};
pub use model::{
    BindingConfig, ConfigFile, ConfigSection, GroupConfig, GroupKind, RawConfigFile, TaskConfig,
    TransformConfig, WatchConfig,
};
pub use validate::DEFAULT_ALIAS;
