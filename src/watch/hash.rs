// src/watch/hash.rs

//! Content hashing so a watch can skip triggers when nothing actually
//! changed (editor touch, save without edits).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use blake3::Hasher;
use tracing::debug;

use crate::fs::FileSystem;
use crate::fs::path_utils::to_slash;
use crate::glob::GlobResolver;

/// Hash of a single file's bytes.
pub fn compute_file_hash(contents: &[u8]) -> String {
    blake3::hash(contents).to_hex().to_string()
}

/// Deterministic hash over a set of files: paths are sorted first, and each
/// path is mixed in with its content hash so renames count as changes.
pub fn compute_hash_for_paths(fs: &dyn FileSystem, root: &Path, paths: &[PathBuf]) -> Result<String> {
    let mut sorted: Vec<&PathBuf> = paths.iter().collect();
    sorted.sort();

    let mut hasher = Hasher::new();
    for path in sorted {
        let full = root.join(path);
        if !fs.is_file(&full) {
            continue;
        }
        hasher.update(to_slash(path).as_bytes());
        hasher.update(compute_file_hash(&fs.read(&full)?).as_bytes());
    }
    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, files = paths.len(), "computed aggregate hash");
    Ok(hash)
}

/// Decides whether the files behind a watch changed since last asked.
///
/// Only the most recent aggregate hash is kept, in memory.
pub struct HashGate {
    task: String,
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    patterns: Vec<String>,
    last: Option<String>,
}

impl HashGate {
    pub fn new(
        task: impl Into<String>,
        fs: Arc<dyn FileSystem>,
        root: impl Into<PathBuf>,
        patterns: Vec<String>,
    ) -> Self {
        Self {
            task: task.into(),
            fs,
            root: root.into(),
            patterns,
            last: None,
        }
    }

    fn current_hash(&self) -> Result<String> {
        let set = GlobResolver::new(self.fs.as_ref(), &self.root).resolve(&self.patterns, &[])?;
        let paths: Vec<PathBuf> = set.paths().map(Path::to_path_buf).collect();
        compute_hash_for_paths(self.fs.as_ref(), &self.root, &paths)
    }

    /// Record the current state without reporting a change.
    pub fn prime(&mut self) -> Result<()> {
        self.last = Some(self.current_hash()?);
        Ok(())
    }

    /// `true` if the watched content differs from the last recorded state;
    /// the new state is recorded either way.
    pub fn changed(&mut self) -> Result<bool> {
        let hash = self.current_hash()?;
        let changed = self.last.as_deref() != Some(hash.as_str());
        debug!(task = %self.task, changed, "checked watched content");
        self.last = Some(hash);
        Ok(changed)
    }
}
