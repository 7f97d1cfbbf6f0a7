// src/engine/watch_loop.rs

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::engine::runner::{CancelHandle, Runner};
use crate::engine::{RunReport, TaskName};
use crate::errors::Result;
use crate::exec::ActionBackend;
use crate::types::TriggerWhileRunningBehaviour;

/// What a watch loop did before it stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSummary {
    pub runs_started: usize,
    pub runs_cancelled: usize,
    pub runs_failed: usize,
    pub last_report: Option<RunReport>,
}

/// Handle for the run currently in progress.
///
/// - `cancel` aborts the run (used by the `cancel` behaviour).
/// - `handle` is the Tokio task executing the run.
struct ActiveRun {
    cancel: Option<CancelHandle>,
    handle: JoinHandle<Result<RunReport>>,
}

/// Re-runs `target` once per trigger.
///
/// A trigger arriving while a run is in progress either cancels that run
/// and starts a fresh one ([`TriggerWhileRunningBehaviour::Cancel`]) or is
/// remembered and served once the run ends
/// ([`TriggerWhileRunningBehaviour::Queue`]); queued triggers coalesce.
/// A failed run is logged and the loop keeps watching.
pub struct WatchLoop<B> {
    runner: Runner<B>,
    target: TaskName,
    behaviour: TriggerWhileRunningBehaviour,
}

impl<B: ActionBackend + 'static> WatchLoop<B> {
    pub fn new(runner: Runner<B>, target: TaskName, behaviour: TriggerWhileRunningBehaviour) -> Self {
        Self {
            runner,
            target,
            behaviour,
        }
    }

    /// Serve `triggers` until `shutdown` resolves or the trigger channel
    /// closes. On shutdown the active run is cancelled; on channel close it
    /// is allowed to finish, followed by a queued run if there is one.
    pub async fn run<S>(self, mut triggers: mpsc::Receiver<()>, shutdown: S) -> Result<WatchSummary>
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut active: Option<ActiveRun> = None;
        let mut queued = false;
        let mut summary = WatchSummary::default();

        info!(task = %self.target, behaviour = ?self.behaviour, "watch loop started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(task = %self.target, "shutdown requested; stopping watch loop");
                    if let Some(run) = active.take() {
                        self.cancel_run(run, &mut summary).await;
                    }
                    break;
                }
                trigger = triggers.recv() => {
                    let Some(()) = trigger else {
                        debug!(task = %self.target, "trigger channel closed");
                        if let Some(run) = active.take() {
                            let joined = run.handle.await;
                            self.record(joined, &mut summary);
                        }
                        if queued {
                            let run = self.start_run(&mut summary);
                            let joined = run.handle.await;
                            self.record(joined, &mut summary);
                        }
                        break;
                    };

                    match (active.take(), self.behaviour) {
                        (None, _) => active = Some(self.start_run(&mut summary)),
                        (Some(run), TriggerWhileRunningBehaviour::Cancel) => {
                            info!(task = %self.target, "change during run; restarting");
                            self.cancel_run(run, &mut summary).await;
                            active = Some(self.start_run(&mut summary));
                        }
                        (Some(run), TriggerWhileRunningBehaviour::Queue) => {
                            if !queued {
                                info!(task = %self.target, "change during run; queued");
                            }
                            queued = true;
                            active = Some(run);
                        }
                    }
                }
                joined = join_active(&mut active) => {
                    active = None;
                    self.record(joined, &mut summary);
                    if queued {
                        queued = false;
                        active = Some(self.start_run(&mut summary));
                    }
                }
            }
        }

        info!(
            task = %self.target,
            runs = summary.runs_started,
            cancelled = summary.runs_cancelled,
            failed = summary.runs_failed,
            "watch loop stopped"
        );
        Ok(summary)
    }

    fn start_run(&self, summary: &mut WatchSummary) -> ActiveRun {
        let (cancel, cancel_rx) = CancelHandle::pair();
        let runner = self.runner.clone();
        let target = self.target.clone();
        summary.runs_started += 1;
        let handle = tokio::spawn(async move { runner.execute(&target, Some(cancel_rx)).await });
        ActiveRun {
            cancel: Some(cancel),
            handle,
        }
    }

    async fn cancel_run(&self, mut run: ActiveRun, summary: &mut WatchSummary) {
        if let Some(cancel) = run.cancel.take() {
            cancel.cancel();
        }
        let joined = run.handle.await;
        self.record(joined, summary);
    }

    fn record(
        &self,
        joined: std::result::Result<Result<RunReport>, JoinError>,
        summary: &mut WatchSummary,
    ) {
        match joined {
            Ok(Ok(report)) => {
                if report.cancelled {
                    summary.runs_cancelled += 1;
                } else if !report.succeeded() {
                    summary.runs_failed += 1;
                    warn!(
                        task = %self.target,
                        failed = ?report.failed,
                        "run failed; still watching"
                    );
                }
                summary.last_report = Some(report);
            }
            Ok(Err(err)) => {
                summary.runs_failed += 1;
                error!(task = %self.target, error = %err, "run errored; still watching");
            }
            Err(join_err) => {
                summary.runs_failed += 1;
                error!(task = %self.target, error = %join_err, "run task panicked");
            }
        }
    }
}

/// Wait for the active run to finish; never resolves when idle.
async fn join_active(
    active: &mut Option<ActiveRun>,
) -> std::result::Result<Result<RunReport>, JoinError> {
    match active {
        Some(run) => (&mut run.handle).await,
        None => std::future::pending().await,
    }
}
