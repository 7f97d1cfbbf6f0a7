// src/clean.rs

//! Best-effort deletion of generated output.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::errors::{DeletionError, Result};
use crate::fs::FileSystem;
use crate::glob::resolver::normalize_pattern;
use crate::glob::{GlobResolver, has_magic};

/// Outcome of a clean: how many paths went away and which could not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Number of paths removed; a directory tree counts once.
    pub deleted: usize,
    pub failures: Vec<DeletionError>,
}

impl CleanReport {
    fn record(&mut self, path: PathBuf, result: anyhow::Result<()>) {
        match result {
            Ok(()) => {
                debug!(path = %path.display(), "deleted");
                self.deleted += 1;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to delete; continuing");
                self.failures.push(DeletionError {
                    path,
                    message: format!("{err:#}"),
                });
            }
        }
    }
}

/// Delete everything `patterns` match under `root`.
///
/// - A wildcard-free pattern naming a directory removes the whole tree.
/// - Other patterns go through the glob resolver and remove matched files;
///   `!` patterns exclude files from those matches.
/// - Matching nothing is success. A failed deletion is recorded and the
///   remaining deletions still happen.
pub fn clean(fs: &dyn FileSystem, root: &Path, patterns: &[String]) -> Result<CleanReport> {
    let mut report = CleanReport::default();
    let mut file_patterns = Vec::new();

    for pattern in patterns {
        let literal = normalize_pattern(pattern).trim_end_matches('/');
        if !pattern.starts_with('!') && !has_magic(literal) && !literal.is_empty() {
            let dir = root.join(literal);
            if fs.is_dir(&dir) {
                let result = fs.remove_dir_all(&dir);
                report.record(PathBuf::from(literal), result);
                continue;
            }
        }
        file_patterns.push(pattern.clone());
    }

    let (excludes, includes): (Vec<String>, Vec<String>) =
        file_patterns.into_iter().partition(|p| p.starts_with('!'));
    let resolver = GlobResolver::new(fs, root);
    let mut seen = HashSet::new();

    // Each pattern resolves on its own so an unreadable directory only
    // costs the matches of the pattern that walks it.
    for pattern in includes {
        let mut query = vec![pattern.clone()];
        query.extend(excludes.iter().cloned());
        let set = match resolver.resolve(&query, &[]) {
            Ok(set) => set,
            Err(err) => {
                report.record(PathBuf::from(&pattern), Err(anyhow::Error::from(err)));
                continue;
            }
        };
        for path in set.paths() {
            let full = root.join(path);
            if !seen.insert(path.to_path_buf()) || !fs.is_file(&full) {
                continue;
            }
            let result = fs.remove_file(&full);
            report.record(path.to_path_buf(), result);
        }
    }

    info!(
        deleted = report.deleted,
        failures = report.failures.len(),
        "clean finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn zero_matches_is_success_with_count_zero() {
        let fs = MockFileSystem::new();
        fs.add_file("src/a.ts", "a");
        let report = clean(&fs, Path::new("."), &strings(&[".tmp/**/*.css", "build/"])).unwrap();
        assert_eq!(report, CleanReport::default());
        assert_eq!(fs.files().len(), 1);
    }

    #[test]
    fn literal_directory_is_removed_recursively() {
        let fs = MockFileSystem::new();
        fs.add_file(".tmp/a.js", "a");
        fs.add_file(".tmp/sub/b.css", "b");
        fs.add_file("src/c.ts", "c");

        let report = clean(&fs, Path::new("."), &strings(&[".tmp/"])).unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(fs.files(), vec![PathBuf::from("src/c.ts")]);
    }

    #[test]
    fn glob_patterns_delete_matching_files_only() {
        let fs = MockFileSystem::new();
        fs.add_file(".tmp/styles/a.css", "a");
        fs.add_file(".tmp/styles/b.css", "b");
        fs.add_file(".tmp/app/x.js", "x");

        let report = clean(&fs, Path::new("."), &strings(&[".tmp/**/*.css"])).unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(fs.files(), vec![PathBuf::from(".tmp/app/x.js")]);
    }

    #[test]
    fn failures_are_collected_and_do_not_abort() {
        let fs = MockFileSystem::new();
        fs.add_file("build/fonts/a.woff", "a");
        fs.add_file("build/fonts/b.woff", "b");
        fs.add_file("build/fonts/c.woff", "c");
        fs.lock_path("build/fonts/b.woff");

        let report = clean(&fs, Path::new("."), &strings(&["build/fonts/*.woff"])).unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from("build/fonts/b.woff"));
        assert_eq!(fs.files(), vec![PathBuf::from("build/fonts/b.woff")]);
    }

    #[test]
    fn unreadable_directory_is_a_failure_not_an_abort() {
        let fs = MockFileSystem::new();
        fs.add_file(".tmp/js/a.js", "a");
        fs.add_file(".tmp/styles/a.css", "b");
        fs.deny_listing(".tmp/js");

        let report = clean(
            &fs,
            Path::new("."),
            &strings(&[".tmp/js/**/*.js", ".tmp/styles/*.css"]),
        )
        .unwrap();
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].path, PathBuf::from(".tmp/js/**/*.js"));
        assert_eq!(fs.files(), vec![PathBuf::from(".tmp/js/a.js")]);
    }

    #[test]
    fn excludes_apply_to_every_pattern() {
        let fs = MockFileSystem::new();
        fs.add_file("build/js/app.js", "a");
        fs.add_file("build/js/keep.js", "k");
        fs.add_file("build/index.html", "h");

        let report = clean(
            &fs,
            Path::new("."),
            &strings(&["build/**/*.js", "build/*.html", "!build/js/keep.js"]),
        )
        .unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(fs.files(), vec![PathBuf::from("build/js/keep.js")]);
    }
}
