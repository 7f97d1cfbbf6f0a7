// src/errors.rs

//! Crate-wide error types.
//!
//! - [`ConfigError`] covers everything that is wrong with the pipeline
//!   definition itself and is detected before any work begins.
//! - [`CompilationError`] is raised by a transform adapter that rejects an
//!   input file.
//! - [`DeletionError`] is never fatal; the cleaner collects them.

use std::path::PathBuf;

use thiserror::Error;

use crate::engine::TaskName;

#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Compilation error: {0}")]
    Compilation(#[from] CompilationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("{} task(s) failed: {}", failed.len(), failed.join(", "))]
    TasksFailed { failed: Vec<TaskName> },

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Problems with the pipeline definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("cycle detected in task graph involving task '{task}'")]
    Cycle { task: TaskName },

    #[error("task '{task}' has unknown dependency '{dep}' in `after`")]
    UnknownDependency { task: TaskName, dep: TaskName },

    #[error("task '{0}' is registered more than once")]
    DuplicateTask(TaskName),

    #[error("task name '{0}' is reserved")]
    ReservedName(TaskName),

    #[error("missing required config option `{0}`")]
    MissingOption(String),

    #[error("no `<!-- inject:{label} -->` region in {}", document.display())]
    MissingMarker { document: PathBuf, label: String },

    #[error("injection region '{label}' appears more than once in {}", document.display())]
    DuplicateMarker { document: PathBuf, label: String },

    #[error("task '{task}' uses unknown adapter '{adapter}'")]
    UnknownAdapter { task: TaskName, adapter: String },

    #[error("{0}")]
    Invalid(String),
}

/// A transform adapter rejected one of its inputs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {message}", file.display())]
pub struct CompilationError {
    pub file: PathBuf,
    pub message: String,
}

impl CompilationError {
    pub fn new(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            message: message.into(),
        }
    }
}

/// A single path the cleaner failed to remove.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to delete {}: {message}", path.display())]
pub struct DeletionError {
    pub path: PathBuf,
    pub message: String,
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, AssetdagError>;
