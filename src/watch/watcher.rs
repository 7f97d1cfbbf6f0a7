// src/watch/watcher.rs

use std::path::PathBuf;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::fs::path_utils::relative_str;
use crate::watch::patterns::WatchPatterns;

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive. Dropping this handle
/// stops file watching and closes the change channel.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Paths in `event` that are watched, relative to `root`.
fn matching_paths(root: &std::path::Path, patterns: &WatchPatterns, event: &Event) -> Vec<PathBuf> {
    if event.kind.is_access() {
        return Vec::new();
    }
    event
        .paths
        .iter()
        .filter_map(|path| relative_str(root, path))
        .filter(|rel| patterns.matches(rel))
        .map(PathBuf::from)
        .collect()
}

/// Watch `root` recursively and send every changed path that matches
/// `patterns` (root-relative) to `changes`.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    patterns: WatchPatterns,
    changes: mpsc::UnboundedSender<PathBuf>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    let callback_root = root.clone();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                trace!(?event, "received notify event");
                for rel in matching_paths(&callback_root, &patterns, &event) {
                    debug!(path = %rel.display(), "watched file changed");
                    if changes.send(rel).is_err() {
                        return;
                    }
                }
            }
            Err(err) => warn!(error = %err, "file watch error"),
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!(root = %root.display(), "file watcher started");

    Ok(WatcherHandle { _inner: watcher })
}
