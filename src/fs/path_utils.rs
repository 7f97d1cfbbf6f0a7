// src/fs/path_utils.rs

//! Utility functions for path handling.

use std::path::{Component, Path, PathBuf};

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// - First we try a direct `strip_prefix(root)`.
/// - If that fails (e.g. due to symlinks or different absolute prefixes),
///   we canonicalize both paths and try again.
///
/// Returns `None` if the path cannot be reasonably related to `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    // Notably on macOS the same directory may be reported under different
    // absolute prefixes (/private/var/... vs /var/...).
    if let (Ok(root_canon), Ok(path_canon)) = (root.canonicalize(), path.canonicalize()) {
        if let Ok(rel) = path_canon.strip_prefix(&root_canon) {
            return Some(to_slash(rel));
        }
    }

    None
}

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Resolve `.` and `..` components without touching the filesystem.
///
/// Leading `..` components of a relative path are kept.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Path of `target` as seen from directory `from_dir`. Both paths must be
/// relative to the same root (or both absolute).
///
/// `relative_between("a/b", "a/c/x.js") == "../c/x.js"`
pub fn relative_between(from_dir: &Path, target: &Path) -> PathBuf {
    let from = normalize_lexically(from_dir);
    let to = normalize_lexically(target);

    let from_parts: Vec<_> = from.components().collect();
    let to_parts: Vec<_> = to.components().collect();

    let common = from_parts
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut rel = PathBuf::new();
    for _ in common..from_parts.len() {
        rel.push("..");
    }
    for part in &to_parts[common..] {
        rel.push(part.as_os_str());
    }
    rel
}

/// Whether `path` lies inside `dir` after lexical normalization.
pub fn is_within(dir: &Path, path: &Path) -> bool {
    let dir = normalize_lexically(dir);
    let path = normalize_lexically(path);
    path.starts_with(&dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dots() {
        assert_eq!(
            normalize_lexically(Path::new("./a/b/../c/./d.js")),
            PathBuf::from("a/c/d.js")
        );
        assert_eq!(
            normalize_lexically(Path::new("../x/y")),
            PathBuf::from("../x/y")
        );
    }

    #[test]
    fn relative_between_siblings_and_children() {
        assert_eq!(
            relative_between(Path::new(".tmp"), Path::new(".tmp/app/main.js")),
            PathBuf::from("app/main.js")
        );
        assert_eq!(
            relative_between(Path::new(".tmp"), Path::new("bower_components/jquery/jquery.js")),
            PathBuf::from("../bower_components/jquery/jquery.js")
        );
        assert_eq!(
            relative_between(Path::new(""), Path::new("styles/app.css")),
            PathBuf::from("styles/app.css")
        );
    }

    #[test]
    fn is_within_ignores_dot_segments() {
        assert!(is_within(Path::new("./build/"), Path::new("build/js/app.js")));
        assert!(!is_within(Path::new("build"), Path::new("build/../src/app.ts")));
        assert!(!is_within(Path::new("build"), Path::new("builder/x")));
    }
}
