// src/glob/resolver.rs

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher, GlobSet, GlobSetBuilder};
use tracing::{debug, trace};

use crate::errors::{ConfigError, Result};
use crate::fs::FileSystem;
use crate::fs::path_utils::to_slash;
use crate::glob::fileset::{FileEntry, FileSet};

const GLOB_META: &[char] = &['*', '?', '[', '{'];

/// Whether a pattern contains glob metacharacters.
pub fn has_magic(pattern: &str) -> bool {
    pattern.contains(GLOB_META)
}

/// Strip a leading `./` so patterns line up with root-relative paths.
pub fn normalize_pattern(pattern: &str) -> &str {
    let mut p = pattern;
    while let Some(rest) = p.strip_prefix("./") {
        p = rest;
    }
    p
}

/// Literal directory prefix of a pattern.
///
/// - `src/app/**/*.ts` -> `src/app`
/// - `*.js` -> `` (the root)
/// - `src/index.html` (no wildcard) -> `src`
pub fn glob_base(pattern: &str) -> PathBuf {
    let pattern = normalize_pattern(pattern);
    let parts: Vec<&str> = pattern.split('/').collect();
    let literal_len = parts
        .iter()
        .position(|part| has_magic(part))
        .unwrap_or(parts.len().saturating_sub(1));
    parts[..literal_len]
        .iter()
        .filter(|p| !p.is_empty())
        .collect()
}

/// Compile a single pattern. `*` never crosses a `/`.
pub fn compile_glob(pattern: &str) -> std::result::Result<GlobMatcher, ConfigError> {
    GlobBuilder::new(normalize_pattern(pattern))
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| ConfigError::Invalid(format!("invalid glob pattern '{pattern}': {e}")))
}

/// Compile several patterns into one set.
pub fn compile_globset(patterns: &[String]) -> std::result::Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(normalize_pattern(pattern))
            .literal_separator(true)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("invalid glob pattern '{pattern}': {e}")))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ConfigError::Invalid(format!("invalid glob set: {e}")))
}

/// Expands configured path patterns into concrete ordered file lists.
///
/// All patterns are relative to `root`.
#[derive(Debug, Clone, Copy)]
pub struct GlobResolver<'a> {
    fs: &'a dyn FileSystem,
    root: &'a Path,
}

impl<'a> GlobResolver<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: &'a Path) -> Self {
        Self { fs, root }
    }

    pub fn root(&self) -> &Path {
        self.root
    }

    /// Resolve `patterns` into a [`FileSet`].
    ///
    /// - Matches from all positive patterns are unioned in pattern order;
    ///   within a pattern, directory walks are sorted by name.
    /// - A pattern prefixed with `!` removes matches of every positive pattern.
    /// - When `order_hints` is non-empty, files are stably sorted by the index
    ///   of the first hint they match; files matching no hint go last.
    pub fn resolve(&self, patterns: &[String], order_hints: &[String]) -> Result<FileSet> {
        let (negative, positive): (Vec<&String>, Vec<&String>) =
            patterns.iter().partition(|p| p.starts_with('!'));

        let excludes: Vec<String> = negative
            .iter()
            .map(|p| p.trim_start_matches('!').to_string())
            .collect();
        let exclude_set = if excludes.is_empty() {
            None
        } else {
            Some(compile_globset(&excludes)?)
        };

        let mut entries = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();

        for pattern in positive {
            let pattern = normalize_pattern(pattern);
            let base = glob_base(pattern);
            let mut matched = Vec::new();

            if has_magic(pattern) {
                let matcher = compile_glob(pattern)?;
                let start = self.root.join(&base);
                if self.fs.is_dir(&start) {
                    self.walk(&start, &mut |rel: &str| {
                        if matcher.is_match(rel) {
                            matched.push(PathBuf::from(rel));
                        }
                    })?;
                }
            } else if self.fs.is_file(&self.root.join(pattern)) {
                matched.push(PathBuf::from(pattern));
            }

            trace!(pattern, count = matched.len(), "glob pattern expanded");

            for path in matched {
                let rel = to_slash(&path);
                if exclude_set.as_ref().is_some_and(|ex| ex.is_match(&rel)) {
                    continue;
                }
                if seen.insert(path.clone()) {
                    entries.push(FileEntry {
                        path,
                        base: base.clone(),
                    });
                }
            }
        }

        let mut set = FileSet::from_entries(entries);
        if !order_hints.is_empty() {
            apply_order(&mut set, order_hints)?;
        }

        debug!(
            patterns = ?patterns,
            files = set.len(),
            "resolved file set"
        );
        Ok(set)
    }

    /// Depth-first walk in sorted order, calling `visit` with each file's
    /// root-relative `/`-separated path. Symlinked directories below the
    /// walk's start are not entered.
    fn walk(&self, dir: &Path, visit: &mut dyn FnMut(&str)) -> Result<()> {
        for path in self.fs.read_dir(dir)? {
            if self.fs.is_dir(&path) {
                if self.fs.is_symlink(&path) {
                    trace!(dir = %path.display(), "not following symlinked directory");
                    continue;
                }
                self.walk(&path, visit)?;
            } else if self.fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(self.root) {
                    let rel = to_slash(rel);
                    visit(rel.trim_start_matches("./"));
                }
            }
        }
        Ok(())
    }
}

/// Stable-sort a file set by order hints: first matching hint wins; files
/// matching no hint keep their relative order after all hinted files.
pub fn apply_order(set: &mut FileSet, order_hints: &[String]) -> Result<()> {
    let matchers = order_hints
        .iter()
        .map(|h| compile_glob(h))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let rank = |entry: &FileEntry| {
        let rel = to_slash(&entry.path);
        matchers
            .iter()
            .position(|m| m.is_match(&rel))
            .unwrap_or(matchers.len())
    };

    set.entries_mut().sort_by_key(|e| rank(e));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn paths(set: &FileSet) -> Vec<String> {
        set.paths().map(to_slash).collect()
    }

    fn project() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("a/plugin.js", "p");
        fs.add_file("a/base.js", "b");
        fs.add_file("a/zeta.js", "z");
        fs.add_file("a/nested/deep.js", "d");
        fs.add_file("a/style.css", "c");
        fs
    }

    #[test]
    fn glob_base_stops_at_first_wildcard() {
        assert_eq!(glob_base("src/app/**/*.ts"), PathBuf::from("src/app"));
        assert_eq!(glob_base("./*.js"), PathBuf::from(""));
        assert_eq!(glob_base("src/index.html"), PathBuf::from("src"));
        assert_eq!(glob_base("src/{a,b}/x.js"), PathBuf::from("src"));
    }

    #[test]
    fn star_does_not_cross_directories() {
        let fs = project();
        let resolver = GlobResolver::new(&fs, Path::new("."));
        let set = resolver.resolve(&strings(&["a/*.js"]), &[]).unwrap();
        assert_eq!(paths(&set), vec!["a/base.js", "a/plugin.js", "a/zeta.js"]);

        let deep = resolver.resolve(&strings(&["a/**/*.js"]), &[]).unwrap();
        assert!(deep.contains(Path::new("a/nested/deep.js")));
    }

    #[test]
    fn union_has_no_duplicates_and_keeps_first_match_order() {
        let fs = project();
        let resolver = GlobResolver::new(&fs, Path::new("."));
        let set = resolver
            .resolve(&strings(&["a/zeta.js", "a/*.js", "a/**/*.js"]), &[])
            .unwrap();
        assert_eq!(
            paths(&set),
            vec!["a/zeta.js", "a/base.js", "a/plugin.js", "a/nested/deep.js"]
        );
    }

    #[test]
    fn order_hint_places_base_library_first() {
        let fs = project();
        let resolver = GlobResolver::new(&fs, Path::new("."));
        let set = resolver
            .resolve(&strings(&["a/*.js"]), &strings(&["a/base.js"]))
            .unwrap();
        assert_eq!(paths(&set)[0], "a/base.js");
    }

    #[test]
    fn first_matching_hint_wins_and_unmatched_files_go_last() {
        let fs = project();
        let resolver = GlobResolver::new(&fs, Path::new("."));
        let set = resolver
            .resolve(
                &strings(&["a/**/*.js"]),
                &strings(&["**/zeta.js", "a/nested/**", "**/*.js"]),
            )
            .unwrap();
        // zeta matches hint 0 (and hint 2); deep.js matches hint 1; the rest
        // match hint 2 and keep their walk order.
        assert_eq!(
            paths(&set),
            vec!["a/zeta.js", "a/nested/deep.js", "a/base.js", "a/plugin.js"]
        );

        let partial = resolver
            .resolve(&strings(&["a/*.js"]), &strings(&["**/plugin.js"]))
            .unwrap();
        assert_eq!(paths(&partial), vec!["a/plugin.js", "a/base.js", "a/zeta.js"]);
    }

    #[test]
    fn negated_patterns_exclude_matches() {
        let fs = project();
        let resolver = GlobResolver::new(&fs, Path::new("."));
        let set = resolver
            .resolve(&strings(&["a/**/*.js", "!a/nested/**"]), &[])
            .unwrap();
        assert!(!set.contains(Path::new("a/nested/deep.js")));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn missing_base_directory_matches_nothing() {
        let fs = project();
        let resolver = GlobResolver::new(&fs, Path::new("."));
        let set = resolver.resolve(&strings(&["nope/**/*.js", "nope.js"]), &[]).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn entries_remember_their_glob_base() {
        let fs = project();
        let resolver = GlobResolver::new(&fs, Path::new("."));
        let set = resolver.resolve(&strings(&["a/**/*.js"]), &[]).unwrap();
        let deep = set
            .entries()
            .iter()
            .find(|e| e.path == Path::new("a/nested/deep.js"))
            .unwrap();
        assert_eq!(deep.relative(), Path::new("nested/deep.js"));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_directories_are_not_followed() {
        use crate::fs::RealFileSystem;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/app")).unwrap();
        std::fs::write(dir.path().join("src/app/main.ts"), "x").unwrap();
        std::os::unix::fs::symlink("..", dir.path().join("src/app/loop")).unwrap();

        let fs = RealFileSystem;
        let resolver = GlobResolver::new(&fs, dir.path());
        let set = resolver.resolve(&strings(&["src/**/*.ts"]), &[]).unwrap();
        assert_eq!(paths(&set), vec!["src/app/main.ts"]);
    }
}
