// src/engine/runner.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::dag::{ScheduledTask, Scheduler, TaskGraph};
use crate::engine::{RunReport, TaskName, TaskOutcome};
use crate::errors::{AssetdagError, Result};
use crate::exec::ActionBackend;

/// Sender half of a run's cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(oneshot::Sender<()>);

impl CancelHandle {
    /// A handle plus the receiver to pass to [`Runner::execute`].
    pub fn pair() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self(tx), rx)
    }

    /// Ask the run to stop. A run that already finished ignores this.
    pub fn cancel(self) {
        let _ = self.0.send(());
    }
}

/// Executes a target's dependency closure.
///
/// Ready actions run concurrently as tasks on a [`JoinSet`]; only this
/// loop touches the scheduler. Group nodes complete as soon as their
/// dependencies are done.
pub struct Runner<B> {
    graph: Arc<TaskGraph>,
    backend: Arc<B>,
}

impl<B> Clone for Runner<B> {
    fn clone(&self) -> Self {
        Self {
            graph: Arc::clone(&self.graph),
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B> fmt::Debug for Runner<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("tasks", &self.graph.len())
            .finish_non_exhaustive()
    }
}

impl<B: ActionBackend + 'static> Runner<B> {
    pub fn new(graph: Arc<TaskGraph>, backend: B) -> Self {
        Self {
            graph,
            backend: Arc::new(backend),
        }
    }

    pub fn graph(&self) -> &Arc<TaskGraph> {
        &self.graph
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run `target` and fail if any node failed.
    pub async fn run(&self, target: &str) -> Result<RunReport> {
        let report = self.execute(target, None).await?;
        if report.failed.is_empty() {
            Ok(report)
        } else {
            Err(AssetdagError::TasksFailed {
                failed: report.failed,
            })
        }
    }

    /// Run `target` and report per-node results without turning failures
    /// into an error.
    ///
    /// When `cancel` fires, in-flight actions are aborted, nothing new is
    /// started, and the report is marked cancelled.
    pub async fn execute(
        &self,
        target: &str,
        cancel: Option<oneshot::Receiver<()>>,
    ) -> Result<RunReport> {
        let graph = Arc::clone(&self.graph);
        graph.closure(target)?;

        let mut scheduler = Scheduler::new(&graph);
        let run_id = scheduler.start_new_run();
        info!(run_target = target, run_id, "run started");

        let mut report = RunReport {
            target: target.to_string(),
            run_id,
            ..RunReport::default()
        };

        let mut ready: VecDeque<ScheduledTask> = scheduler.handle_trigger(target).into();
        let mut running: JoinSet<(TaskName, Result<()>)> = JoinSet::new();

        let cancelled = wait_for_cancel(cancel);
        tokio::pin!(cancelled);

        loop {
            while let Some(task) = ready.pop_front() {
                report.started.push(task.name.clone());
                let action = graph.node(&task.name).and_then(|n| n.action.clone());
                match action {
                    None => {
                        debug!(task = %task.name, run_id, "group task done");
                        report.completed.push(task.name.clone());
                        ready.extend(scheduler.handle_completion(&task.name, TaskOutcome::Success));
                    }
                    Some(action) => {
                        let backend = Arc::clone(&self.backend);
                        running.spawn(async move {
                            let result = backend.run_action(&task, &action).await;
                            (task.name, result)
                        });
                    }
                }
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                joined = running.join_next() => {
                    let Some(joined) = joined else { break };
                    let (name, result) = match joined {
                        Ok(pair) => pair,
                        Err(join_err) => {
                            running.shutdown().await;
                            return Err(anyhow::anyhow!("task panicked: {join_err}").into());
                        }
                    };
                    match result {
                        Ok(()) => {
                            report.completed.push(name.clone());
                            ready.extend(scheduler.handle_completion(&name, TaskOutcome::Success));
                        }
                        Err(err) => {
                            error!(task = %name, run_id, error = %err, "task failed");
                            report.errors.insert(name.clone(), err.to_string());
                            let step = scheduler.step_completion(&name, TaskOutcome::Failed);
                            report.failed.extend(step.newly_failed);
                            ready.extend(step.newly_scheduled);
                        }
                    }
                }
                _ = &mut cancelled => {
                    info!(run_target = target, run_id, in_flight = running.len(), "run cancelled; aborting in-flight actions");
                    running.shutdown().await;
                    scheduler.abort_run();
                    report.cancelled = true;
                    break;
                }
            }
        }

        report.statuses = scheduler.statuses();
        if report.succeeded() {
            info!(run_target = target, run_id, tasks = report.completed.len(), "run finished");
        } else if !report.cancelled {
            error!(run_target = target, run_id, failed = ?report.failed, "run failed");
        }
        Ok(report)
    }
}

/// Resolves when `cancel` receives a value. A dropped sender never cancels.
async fn wait_for_cancel(cancel: Option<oneshot::Receiver<()>>) {
    match cancel {
        Some(rx) => {
            if rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}
