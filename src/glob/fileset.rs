// src/glob/fileset.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// One resolved file plus the glob base of the pattern that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Path relative to the project root.
    pub path: PathBuf,
    /// Literal directory prefix of the matching pattern (`src/app/` for
    /// `src/app/**/*.ts`). Output paths are computed relative to it.
    pub base: PathBuf,
}

impl FileEntry {
    /// Path relative to the glob base (`x/a.ts` for `src/app/x/a.ts`).
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.base).unwrap_or(&self.path)
    }
}

/// Ordered, deduplicated sequence of resolved file paths.
///
/// Order is significant: concatenation and injection preserve it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    entries: Vec<FileEntry>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from entries, keeping the first occurrence of each path.
    pub fn from_entries(entries: impl IntoIterator<Item = FileEntry>) -> Self {
        let mut set = Self::new();
        let mut seen = HashSet::new();
        for entry in entries {
            if seen.insert(entry.path.clone()) {
                set.entries.push(entry);
            }
        }
        set
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.entries.iter().any(|e| e.path == path)
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<FileEntry> {
        &mut self.entries
    }
}

impl IntoIterator for FileSet {
    type Item = FileEntry;
    type IntoIter = std::vec::IntoIter<FileEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
