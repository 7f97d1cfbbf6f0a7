// src/dag/scheduler.rs

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::dag::TaskGraph;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::{ReadOnlyStateManager, StateManager};
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskStatus};
use crate::engine::{TaskName, TaskOutcome};

/// Per-run state machine over a [`TaskGraph`].
///
/// It is responsible for:
/// - remembering which tasks are part of the current run
/// - deciding when a task is ready (all dependencies Done)
/// - marking tasks Done / Failed
/// - failing dependents of a failed task without starting them
///
/// The scheduler is synchronous and performs no IO; the runner drives it.
#[derive(Debug)]
pub struct Scheduler<'g> {
    graph: &'g TaskGraph,
    tasks: BTreeMap<TaskName, TaskInfo>,
    run_counter: u64,
    current_run_id: Option<u64>,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g TaskGraph) -> Self {
        let tasks = graph
            .nodes()
            .map(|node| {
                (
                    node.name.clone(),
                    TaskInfo::new(node.name.clone(), node.dependencies.clone()),
                )
            })
            .collect();

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    pub fn current_run_id(&self) -> Option<u64> {
        self.current_run_id
    }

    /// `None` if the task is unknown.
    pub fn status_of(&self, task: &str) -> Option<TaskStatus> {
        self.tasks.get(task).map(|info| info.run_state.into())
    }

    /// Status of every task, by name.
    pub fn statuses(&self) -> BTreeMap<TaskName, TaskStatus> {
        self.tasks
            .iter()
            .map(|(name, info)| (name.clone(), info.run_state.into()))
            .collect()
    }

    /// `None` if the task is unknown.
    pub fn deps_satisfied(&self, task: &str) -> Option<bool> {
        let info = self.tasks.get(task)?;
        Some(ReadOnlyStateManager::new(&self.tasks).deps_satisfied_for_info(info))
    }

    /// Start a new run, clearing all per-run state.
    pub fn start_new_run(&mut self) -> u64 {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);
        for info in self.tasks.values_mut() {
            info.run_state = None;
        }
        debug!(run_id = self.run_counter, "scheduler: starting new run");
        self.run_counter
    }

    /// Add `task` and its dependency closure to the current run and return
    /// the tasks that can start immediately.
    pub fn handle_trigger(&mut self, task: &str) -> Vec<ScheduledTask> {
        self.trigger_step_internal(task).newly_scheduled
    }

    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.completion_step_internal(task, outcome).newly_scheduled
    }

    /// Like [`Scheduler::handle_completion`] but returns the full [`SchedulerStep`],
    /// including dependents failed along with `task`.
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        self.completion_step_internal(task, outcome)
    }

    /// Abandon the current run. Tasks still Pending or Running are returned
    /// and marked Failed.
    pub fn abort_run(&mut self) -> Vec<TaskName> {
        let mut aborted = Vec::new();
        for info in self.tasks.values_mut() {
            if matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            ) {
                info.run_state = Some(RunState::Failed);
                aborted.push(info.name.clone());
            }
        }
        if let Some(run_id) = self.current_run_id.take() {
            warn!(run_id, aborted = ?aborted, "scheduler: run aborted");
        }
        aborted
    }

    fn maybe_finish_run(&mut self) -> bool {
        if self.current_run_id.is_none() {
            return false;
        }

        let manager = StateManager::new(self.graph, &mut self.tasks, self.current_run_id);
        if manager.all_tasks_terminal() {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; run finished"
            );
            self.current_run_id = None;
            true
        } else {
            false
        }
    }

    fn trigger_step_internal(&mut self, task: &str) -> SchedulerStep {
        if self.current_run_id.is_none() {
            debug!(task, "trigger with no active run; starting a new run");
            self.start_new_run();
        }

        if self.tasks.contains_key(task) {
            let mut manager = StateManager::new(self.graph, &mut self.tasks, self.current_run_id);
            manager.mark_task_and_dependencies_pending(task);
        } else {
            warn!(task, "trigger for unknown task; ignoring");
        }

        let mut manager = StateManager::new(self.graph, &mut self.tasks, self.current_run_id);
        let newly_scheduled = manager.collect_new_ready_tasks();
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    fn completion_step_internal(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let Some(run_id) = self.current_run_id else {
            warn!(task, "completion with no active run; ignoring");
            return SchedulerStep::default();
        };

        let mut newly_scheduled = Vec::new();
        let mut newly_failed = Vec::new();

        match self.tasks.get_mut(task) {
            Some(info) if info.run_state == Some(RunState::Running) => match outcome {
                TaskOutcome::Success => {
                    info.run_state = Some(RunState::Done);
                    debug!(task, run_id, "task done");
                    let mut manager =
                        StateManager::new(self.graph, &mut self.tasks, self.current_run_id);
                    newly_scheduled.extend(manager.collect_new_ready_tasks());
                }
                TaskOutcome::Failed => {
                    info.run_state = Some(RunState::Failed);
                    warn!(task, run_id, "task failed; failing its dependents");
                    newly_failed.push(task.to_string());
                    let mut manager =
                        StateManager::new(self.graph, &mut self.tasks, self.current_run_id);
                    newly_failed.extend(manager.mark_dependents_failed(task));
                    // Independent branches may still have work to start.
                    newly_scheduled.extend(manager.collect_new_ready_tasks());
                }
            },
            Some(_) => {
                warn!(task, run_id, "completion for a task that is not running; ignoring");
            }
            None => {
                warn!(task, "completion for unknown task; ignoring");
            }
        }

        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed,
            run_just_finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(tasks: &[ScheduledTask]) -> Vec<&str> {
        tasks.iter().map(|t| t.name.as_str()).collect()
    }

    fn diamond() -> TaskGraph {
        let mut g = TaskGraph::new();
        g.register("clean", vec![], None).unwrap();
        g.register("scripts", vec!["clean".into()], None).unwrap();
        g.register("styles", vec!["clean".into()], None).unwrap();
        g.register("build", vec!["scripts".into(), "styles".into()], None)
            .unwrap();
        g.register("unrelated", vec![], None).unwrap();
        g
    }

    #[test]
    fn only_the_dependency_closure_takes_part() {
        let g = diamond();
        let mut s = Scheduler::new(&g);
        s.start_new_run();
        let ready = s.handle_trigger("styles");
        assert_eq!(names(&ready), vec!["clean"]);
        assert_eq!(s.status_of("build"), Some(TaskStatus::NotInRun));
        assert_eq!(s.status_of("unrelated"), Some(TaskStatus::NotInRun));

        let ready = s.handle_completion("clean", TaskOutcome::Success);
        assert_eq!(names(&ready), vec!["styles"]);

        let step = s.step_completion("styles", TaskOutcome::Success);
        assert!(step.run_just_finished);
        assert!(s.is_idle());
    }

    #[test]
    fn dependent_waits_for_all_dependencies() {
        let g = diamond();
        let mut s = Scheduler::new(&g);
        s.start_new_run();
        s.handle_trigger("build");
        let ready = s.handle_completion("clean", TaskOutcome::Success);
        assert_eq!(names(&ready), vec!["scripts", "styles"]);

        assert!(s.handle_completion("scripts", TaskOutcome::Success).is_empty());
        assert_eq!(s.deps_satisfied("build"), Some(false));
        let ready = s.handle_completion("styles", TaskOutcome::Success);
        assert_eq!(names(&ready), vec!["build"]);
    }

    #[test]
    fn failure_fails_dependents_but_not_siblings() {
        let g = diamond();
        let mut s = Scheduler::new(&g);
        s.start_new_run();
        s.handle_trigger("build");
        s.handle_completion("clean", TaskOutcome::Success);

        let step = s.step_completion("scripts", TaskOutcome::Failed);
        assert_eq!(step.newly_failed, vec!["scripts".to_string(), "build".to_string()]);
        assert!(!step.run_just_finished);
        assert_eq!(s.status_of("styles"), Some(TaskStatus::Running));

        let step = s.step_completion("styles", TaskOutcome::Success);
        assert!(step.newly_scheduled.is_empty());
        assert!(step.run_just_finished);
        assert_eq!(s.status_of("build"), Some(TaskStatus::Failed));
    }

    #[test]
    fn abort_marks_unfinished_tasks_failed() {
        let g = diamond();
        let mut s = Scheduler::new(&g);
        s.start_new_run();
        s.handle_trigger("build");
        let mut aborted = s.abort_run();
        aborted.sort();
        assert_eq!(aborted, vec!["build", "clean", "scripts", "styles"]);
        assert!(s.is_idle());
    }
}
