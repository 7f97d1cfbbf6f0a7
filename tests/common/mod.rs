#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use assetdag::config::ConfigFile;
use assetdag::dag::TaskGraph;
use assetdag::engine::WatchHub;
use assetdag::exec::{PipelineBackend, PipelineContext};
use assetdag::fs::RealFileSystem;
use assetdag::pipeline::build_graph;
use assetdag::transform::AdapterRegistry;
use tempfile::TempDir;
use tokio::sync::watch;

pub use assetdag_test_utils::{init_tracing, with_timeout};

/// A throwaway project directory.
pub struct Project {
    pub dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root().join(rel))
            .unwrap_or_else(|e| panic!("reading {rel}: {e}"))
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root().join(rel).exists()
    }
}

/// Graph and production backend for `cfg`, rooted at `root`.
///
/// The returned sender keeps watch tasks alive until it sends `true`.
pub fn pipeline(
    cfg: &ConfigFile,
    root: &Path,
    registry: AdapterRegistry,
) -> (Arc<TaskGraph>, PipelineBackend, watch::Sender<bool>) {
    let graph = Arc::new(build_graph(cfg, &registry).expect("graph builds"));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let backend = PipelineBackend::new(PipelineContext {
        root: root.to_path_buf(),
        fs: Arc::new(RealFileSystem),
        registry,
        graph: Arc::clone(&graph),
        shutdown: shutdown_rx,
        watch_hub: WatchHub::new(),
    });
    (graph, backend, shutdown_tx)
}
