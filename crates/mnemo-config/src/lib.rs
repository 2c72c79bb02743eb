//! Configuration system for mnemo.
//!
//! Provides TOML-based configuration with:
//! - `[session]`, `[vector_store]` and `[embedding]` sections
//! - Config file layering (XDG user config + project-local overrides)
//! - Embedding API key resolution (env var, then config file)

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    load_explicit, save_config, xdg_config_dir, xdg_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
