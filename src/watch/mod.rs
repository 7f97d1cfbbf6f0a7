// src/watch/mod.rs

//! File watching for `watch` tasks.
//!
//! - [`patterns`] compiles a task's watch globs.
//! - [`watcher`] wires up a cross-platform filesystem watcher (`notify`)
//!   and forwards matching root-relative paths.
//! - [`debounce`] coalesces bursts of changes into single triggers.
//! - [`hash`] optionally skips triggers when content did not change.
//!
//! A watch task blocks until shutdown, feeding each coalesced change to
//! the [`crate::engine::WatchHub`] loop that re-runs its target.

pub mod debounce;
pub mod hash;
pub mod patterns;
pub mod watcher;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::dag::action::WatchAction;
use crate::engine::{Runner, TaskName};
use crate::errors::Result;
use crate::exec::PipelineBackend;

pub use debounce::debounce_changes;
pub use hash::{HashGate, compute_file_hash, compute_hash_for_paths};
pub use patterns::WatchPatterns;
pub use watcher::{WatcherHandle, spawn_watcher};

/// Resolve once `shutdown` turns `true`. Never resolves if the sender is
/// dropped without signalling.
pub async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// Execute a watch task: block until shutdown, re-running `action.run`
/// whenever a watched file changes.
pub async fn run_watch(backend: PipelineBackend, task: &TaskName, action: &WatchAction) -> Result<()> {
    let ctx = backend.context();
    let patterns = WatchPatterns::new(&action.patterns)?;

    let gate = if action.use_hash {
        let mut gate = hash::HashGate::new(
            task.clone(),
            Arc::clone(&ctx.fs),
            ctx.root.clone(),
            action.patterns.clone(),
        );
        if let Err(err) = gate.prime() {
            warn!(task = %task, error = %err, "initial hash failed");
        }
        Some(gate)
    } else {
        None
    };

    let (change_tx, change_rx) = mpsc::unbounded_channel();
    let _watcher = spawn_watcher(&ctx.root, patterns, change_tx)?;

    // Watches that re-run the same target share one loop.
    let runner = Runner::new(Arc::clone(&ctx.graph), backend.clone());
    let trigger_tx = ctx.watch_hub.subscribe(
        &runner,
        &action.run,
        action.behaviour,
        wait_for_shutdown(ctx.shutdown.clone()),
    );
    let debouncer = tokio::spawn(debounce_changes(
        change_rx,
        trigger_tx,
        Duration::from_millis(action.debounce_ms),
        gate,
    ));

    info!(
        task = %task,
        run = %action.run,
        patterns = ?action.patterns,
        debounce_ms = action.debounce_ms,
        "watching for changes"
    );

    wait_for_shutdown(ctx.shutdown.clone()).await;
    debouncer.abort();
    info!(task = %task, "watch stopped");
    Ok(())
}
