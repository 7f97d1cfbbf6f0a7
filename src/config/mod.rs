// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - `model.rs`: the TOML-backed data model.
//! - `interpolate.rs`: `{var}` and `@glob` expansion.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: graph and per-task checks run before any work begins.

pub mod interpolate;
pub mod loader;
pub mod model;
pub mod validate;

pub use interpolate::Vars;
pub use loader::{default_config_path, load_and_validate, load_from_path, project_root};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, TaskConfig, TaskKind};
pub use validate::{RESERVED_TASK_NAMES, validate_config};
