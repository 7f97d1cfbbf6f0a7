// src/engine/watch_hub.rs

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::engine::TaskName;
use crate::engine::runner::Runner;
use crate::engine::watch_loop::{WatchLoop, WatchSummary};
use crate::errors::{AssetdagError, Result};
use crate::exec::ActionBackend;
use crate::types::TriggerWhileRunningBehaviour;

const TRIGGER_CAPACITY: usize = 16;

struct SharedLoop {
    triggers: mpsc::WeakSender<()>,
    behaviour: TriggerWhileRunningBehaviour,
}

#[derive(Default)]
struct HubState {
    loops: BTreeMap<TaskName, SharedLoop>,
    handles: Vec<(TaskName, JoinHandle<Result<WatchSummary>>)>,
}

/// One [`WatchLoop`] per run target, shared by every watcher that re-runs it.
///
/// Watchers of the same target feed a single loop, so their triggers cancel
/// or queue against each other instead of starting overlapping runs. A loop
/// ends when its shutdown future resolves or its last subscriber drops the
/// sender; the next subscription for that target then starts a fresh loop.
#[derive(Default)]
pub struct WatchHub {
    state: Mutex<HubState>,
}

impl fmt::Debug for WatchHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("WatchHub")
            .field("targets", &state.loops.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl WatchHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Trigger sender for `target`'s loop, starting the loop on first use.
    ///
    /// `behaviour` and `shutdown` only take effect when this call starts the
    /// loop; later subscribers share the first one's settings.
    pub fn subscribe<B, S>(
        &self,
        runner: &Runner<B>,
        target: &str,
        behaviour: TriggerWhileRunningBehaviour,
        shutdown: S,
    ) -> mpsc::Sender<()>
    where
        B: ActionBackend + 'static,
        S: Future<Output = ()> + Send + 'static,
    {
        let mut state = self.lock();
        if let Some(shared) = state.loops.get(target) {
            if let Some(triggers) = shared.triggers.upgrade() {
                if shared.behaviour != behaviour {
                    warn!(
                        task = target,
                        kept = ?shared.behaviour,
                        ignored = ?behaviour,
                        "watchers disagree on trigger behaviour; keeping the first"
                    );
                }
                debug!(task = target, "joining running watch loop");
                return triggers;
            }
        }

        let (tx, rx) = mpsc::channel(TRIGGER_CAPACITY);
        let watch = WatchLoop::new(runner.clone(), target.to_string(), behaviour);
        let handle = tokio::spawn(watch.run(rx, shutdown));
        state.loops.insert(
            target.to_string(),
            SharedLoop {
                triggers: tx.downgrade(),
                behaviour,
            },
        );
        state.handles.push((target.to_string(), handle));
        debug!(task = target, "started watch loop");
        tx
    }

    /// Wait for every loop started so far and collect their summaries.
    pub async fn join(&self) -> Vec<(TaskName, Result<WatchSummary>)> {
        let handles = std::mem::take(&mut self.lock().handles);
        let mut summaries = Vec::with_capacity(handles.len());
        for (target, handle) in handles {
            let summary = match handle.await {
                Ok(result) => result,
                Err(err) => Err(AssetdagError::from(anyhow::anyhow!(
                    "watch loop for {target} failed: {err}"
                ))),
            };
            summaries.push((target, summary));
        }
        summaries
    }
}
