// src/exec/backend.rs

//! Pluggable action backend.
//!
//! The runner talks to an [`ActionBackend`] instead of executing actions
//! itself. Production uses [`PipelineBackend`]; tests swap in a fake that
//! records what ran and fails on demand.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::dag::action::TaskAction;
use crate::dag::{ScheduledTask, TaskGraph};
use crate::engine::WatchHub;
use crate::errors::Result;
use crate::fs::FileSystem;
use crate::transform::AdapterRegistry;

/// Trait abstracting how a scheduled task's action is executed.
pub trait ActionBackend: Send + Sync {
    fn run_action<'a>(
        &'a self,
        task: &'a ScheduledTask,
        action: &'a TaskAction,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

impl<B: ActionBackend + ?Sized> ActionBackend for Arc<B> {
    fn run_action<'a>(
        &'a self,
        task: &'a ScheduledTask,
        action: &'a TaskAction,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        (**self).run_action(task, action)
    }
}

/// Everything a real action needs.
pub struct PipelineContext {
    /// Project root; every configured path is relative to it.
    pub root: PathBuf,
    pub fs: Arc<dyn FileSystem>,
    pub registry: AdapterRegistry,
    /// Graph used by watch actions to re-run their target.
    pub graph: Arc<TaskGraph>,
    /// Flips to `true` when the process should stop watching.
    pub shutdown: watch::Receiver<bool>,
    /// Watch loops shared by every watch task of this process.
    pub watch_hub: WatchHub,
}

/// Run synchronous filesystem work on the blocking pool.
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| anyhow::anyhow!("blocking worker failed: {e}"))?
}

/// Production backend: dispatches each action kind to its module.
#[derive(Clone)]
pub struct PipelineBackend {
    ctx: Arc<PipelineContext>,
}

impl fmt::Debug for PipelineBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBackend")
            .field("root", &self.ctx.root)
            .field("registry", &self.ctx.registry)
            .finish_non_exhaustive()
    }
}

impl PipelineBackend {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }
}

impl ActionBackend for PipelineBackend {
    fn run_action<'a>(
        &'a self,
        task: &'a ScheduledTask,
        action: &'a TaskAction,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            debug!(task = %task.name, run_id = task.run_id, kind = action.kind(), "running action");
            let ctx = &*self.ctx;
            match action {
                TaskAction::Transform(a) => {
                    let written = super::run_transform(ctx, &task.name, a).await?;
                    info!(task = %task.name, files = written, "transform finished");
                }
                TaskAction::Clean(a) => {
                    let (fs, root, patterns) =
                        (Arc::clone(&ctx.fs), ctx.root.clone(), a.patterns.clone());
                    let report =
                        run_blocking(move || crate::clean::clean(fs.as_ref(), &root, &patterns))
                            .await?;
                    info!(
                        task = %task.name,
                        deleted = report.deleted,
                        failures = report.failures.len(),
                        "clean finished"
                    );
                }
                TaskAction::Inject(a) => {
                    let (fs, root, a) = (Arc::clone(&ctx.fs), ctx.root.clone(), a.clone());
                    let out =
                        run_blocking(move || crate::inject::run_inject(fs.as_ref(), &root, &a))
                            .await?;
                    info!(task = %task.name, document = %out.display(), "inject finished");
                }
                TaskAction::Optimize(a) => {
                    let bundles = crate::optimize::run_optimize(ctx, &task.name, a).await?;
                    info!(task = %task.name, bundles, "optimize finished");
                }
                TaskAction::Watch(a) => {
                    crate::watch::run_watch(self.clone(), &task.name, a).await?;
                }
            }
            Ok(())
        })
    }
}
