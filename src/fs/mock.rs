// src/fs/mock.rs

use super::FileSystem;
use super::path_utils::normalize_lexically;
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory filesystem.
///
/// Only files are stored; directories exist implicitly as prefixes of file
/// paths (plus any created with [`MockFileSystem::add_dir`]). Keys are
/// normalized, so `./src/a.ts` and `src/a.ts` name the same file.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Debug, Default)]
struct MockState {
    files: BTreeMap<PathBuf, Vec<u8>>,
    dirs: BTreeSet<PathBuf>,
    /// Paths whose removal fails (to exercise best-effort deletion).
    locked: HashSet<PathBuf>,
    /// Directories whose listing fails.
    unlistable: HashSet<PathBuf>,
}

fn key(path: &Path) -> PathBuf {
    normalize_lexically(path)
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.inner.lock().unwrap();
        state.files.insert(key(path.as_ref()), content.into());
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.inner.lock().unwrap();
        state.dirs.insert(key(path.as_ref()));
    }

    /// Make every later removal of `path` fail.
    pub fn lock_path(&self, path: impl AsRef<Path>) {
        let mut state = self.inner.lock().unwrap();
        state.locked.insert(key(path.as_ref()));
    }

    /// Make every later `read_dir` of `path` fail.
    pub fn deny_listing(&self, path: impl AsRef<Path>) {
        let mut state = self.inner.lock().unwrap();
        state.unlistable.insert(key(path.as_ref()));
    }

    /// Snapshot of all file paths currently stored.
    pub fn files(&self) -> Vec<PathBuf> {
        let state = self.inner.lock().unwrap();
        state.files.keys().cloned().collect()
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let state = self.inner.lock().unwrap();
        state.files.get(&key(path.as_ref())).cloned()
    }
}

impl MockState {
    fn is_dir(&self, k: &Path) -> bool {
        if k.as_os_str().is_empty() || self.dirs.contains(k) {
            return true;
        }
        self.files.keys().any(|f| f != k && f.starts_with(k))
            || self.dirs.iter().any(|d| d != k && d.starts_with(k))
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.inner.lock().unwrap();
        state
            .files
            .get(&key(path))
            .cloned()
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.add_file(path, contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let k = key(path);
        if state.locked.contains(&k) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        state
            .files
            .remove(&k)
            .map(|_| ())
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        let k = key(path);
        if state.locked.contains(&k) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        if !state.is_dir(&k) {
            return Err(anyhow!("Not a directory: {:?}", path));
        }
        state.files.retain(|f, _| !f.starts_with(&k));
        state.dirs.retain(|d| !d.starts_with(&k));
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        let state = self.inner.lock().unwrap();
        state.files.contains_key(&key(path))
    }

    fn is_dir(&self, path: &Path) -> bool {
        let state = self.inner.lock().unwrap();
        state.is_dir(&key(path))
    }

    fn is_symlink(&self, _path: &Path) -> bool {
        false
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.inner.lock().unwrap();
        let k = key(path);
        if state.unlistable.contains(&k) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        if !state.is_dir(&k) {
            return Err(anyhow!("Not a directory or not found: {:?}", path));
        }

        let mut children: BTreeSet<PathBuf> = BTreeSet::new();
        for entry in state.files.keys().chain(state.dirs.iter()) {
            if let Ok(rest) = entry.strip_prefix(&k) {
                if let Some(first) = rest.components().next() {
                    children.insert(path.join(first.as_os_str()));
                }
            }
        }
        Ok(children.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_implicit() {
        let fs = MockFileSystem::new();
        fs.add_file("./src/app/main.ts", "x");
        fs.add_file("src/lib.ts", "y");

        assert!(fs.is_dir(Path::new("src")));
        assert!(fs.is_dir(Path::new("./src/app")));
        assert!(fs.is_file(Path::new("src/app/main.ts")));
        assert_eq!(
            fs.read_dir(Path::new(".")).unwrap(),
            vec![PathBuf::from("./src")]
        );
        assert_eq!(
            fs.read_dir(Path::new("src")).unwrap(),
            vec![PathBuf::from("src/app"), PathBuf::from("src/lib.ts")]
        );
    }

    #[test]
    fn remove_dir_all_drops_descendants() {
        let fs = MockFileSystem::new();
        fs.add_file(".tmp/a.js", "a");
        fs.add_file(".tmp/sub/b.js", "b");
        fs.add_file("src/c.ts", "c");

        fs.remove_dir_all(Path::new(".tmp")).unwrap();
        assert_eq!(fs.files(), vec![PathBuf::from("src/c.ts")]);
    }
}
