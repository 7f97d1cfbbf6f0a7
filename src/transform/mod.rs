// src/transform/mod.rs

//! Transform adapters.
//!
//! Every file transformation goes through the [`Transform`] trait: an
//! adapter consumes an ordered list of in-memory [`Asset`]s and produces a
//! new ordered list. Adapters compose by piping (see [`chain`]).
//!
//! - [`command`] wraps external executables (TypeScript compiler, JS minifier).
//! - [`sass`] compiles Sass/SCSS in-process with `grass`.
//! - [`css`] minifies CSS in-process with `lightningcss`.
//! - [`concat`] folds a list of assets into one bundle.
//! - [`image`] re-encodes PNG/JPEG images.
//! - [`registry`] maps symbolic adapter names to implementations.

pub mod chain;
pub mod command;
pub mod concat;
pub mod css;
pub mod image;
pub mod registry;
pub mod sass;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use tracing::warn;

use crate::engine::TaskName;
use crate::errors::{CompilationError, ConfigError, Result};
use crate::fs::FileSystem;

pub use chain::{read_assets, run_chain, write_assets};
pub use registry::AdapterRegistry;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A file flowing through an adapter chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Output path, relative to the destination directory.
    pub path: PathBuf,
    /// Root-relative path of the source file this asset came from, if any.
    pub source: Option<PathBuf>,
    pub contents: Vec<u8>,
}

impl Asset {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            source: None,
            contents: contents.into(),
        }
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_extension(mut self, ext: &str) -> Self {
        self.path.set_extension(ext);
        self
    }

    pub fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    /// Path used in error messages: the source file when known.
    pub fn origin(&self) -> &Path {
        self.source.as_deref().unwrap_or(&self.path)
    }

    pub fn text(&self) -> std::result::Result<&str, CompilationError> {
        std::str::from_utf8(&self.contents)
            .map_err(|e| CompilationError::new(self.origin(), format!("not valid UTF-8: {e}")))
    }
}

/// Per-step options from the `pipe` entry (`{ use = "sass", style = "compressed" }`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOptions(toml::Table);

impl StepOptions {
    pub fn new(table: toml::Table) -> Self {
        Self(table)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_str(&self, key: &str) -> std::result::Result<Option<&str>, ConfigError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(toml::Value::String(s)) => Ok(Some(s)),
            Some(other) => Err(type_error(key, "a string", other)),
        }
    }

    pub fn get_bool(&self, key: &str) -> std::result::Result<Option<bool>, ConfigError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(toml::Value::Boolean(b)) => Ok(Some(*b)),
            Some(other) => Err(type_error(key, "a boolean", other)),
        }
    }

    pub fn get_u64(&self, key: &str) -> std::result::Result<Option<u64>, ConfigError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(toml::Value::Integer(i)) if *i >= 0 => Ok(Some(*i as u64)),
            Some(other) => Err(type_error(key, "a non-negative integer", other)),
        }
    }

    pub fn get_str_list(&self, key: &str) -> std::result::Result<Option<Vec<String>>, ConfigError> {
        match self.0.get(key) {
            None => Ok(None),
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    toml::Value::String(s) => Ok(s.clone()),
                    other => Err(type_error(key, "a list of strings", other)),
                })
                .collect::<std::result::Result<Vec<_>, _>>()
                .map(Some),
            Some(other) => Err(type_error(key, "a list of strings", other)),
        }
    }

    /// `strict` option; compile-type adapters default to strict.
    pub fn strict(&self) -> std::result::Result<bool, ConfigError> {
        Ok(self.get_bool("strict")?.unwrap_or(true))
    }
}

fn type_error(key: &str, expected: &str, got: &toml::Value) -> ConfigError {
    ConfigError::Invalid(format!(
        "adapter option `{key}` must be {expected}, got {}",
        got.type_str()
    ))
}

/// One resolved adapter invocation in a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub adapter: String,
    pub options: StepOptions,
}

/// Everything an adapter may need besides its input.
#[derive(Debug, Clone)]
pub struct TransformContext {
    pub task: TaskName,
    /// Project root; asset `source` paths are relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
}

/// Uniform "consume assets, produce assets" contract over one tool.
pub trait Transform: Send + Sync {
    /// Symbolic name the adapter is registered under.
    fn name(&self) -> &str;

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        options: &'a StepOptions,
        ctx: &'a TransformContext,
    ) -> BoxFuture<'a, Result<Vec<Asset>>>;
}

/// Fold per-file compile results according to `strict`.
///
/// - strict: the first failure fails the whole call and no output survives.
/// - lenient: failures are logged and the file is dropped.
pub fn collect_compiled(
    results: Vec<std::result::Result<Option<Asset>, CompilationError>>,
    strict: bool,
    ctx: &TransformContext,
    adapter: &str,
) -> Result<Vec<Asset>> {
    let mut out = Vec::with_capacity(results.len());
    for result in results {
        match result {
            Ok(Some(asset)) => out.push(asset),
            Ok(None) => {}
            Err(err) if strict => return Err(err.into()),
            Err(err) => {
                warn!(
                    task = %ctx.task,
                    adapter,
                    file = %err.file.display(),
                    error = %err.message,
                    "compile failed; dropping file (strict = false)"
                );
            }
        }
    }
    Ok(out)
}
