use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use assetdag::dag::action::TaskAction;
use assetdag::dag::ScheduledTask;
use assetdag::errors::Result;
use assetdag::exec::ActionBackend;

/// What the fake backend observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FakeEvent {
    Started(String),
    Finished(String),
    Failed(String),
}

#[derive(Debug, Default)]
struct State {
    events: Vec<FakeEvent>,
    running: usize,
    max_running: usize,
}

/// A fake backend that:
/// - records when each action starts and ends
/// - sleeps for a configured delay per task
/// - fails the tasks it was told to fail.
///
/// Clones share their recorded state, so keep one clone for assertions
/// and hand the other to the runner.
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<State>>,
    failing: Arc<BTreeSet<String>>,
    delays: Arc<BTreeMap<String, Duration>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, task: &str) -> Self {
        Arc::make_mut(&mut self.failing).insert(task.to_string());
        self
    }

    pub fn delay(mut self, task: &str, delay: Duration) -> Self {
        Arc::make_mut(&mut self.delays).insert(task.to_string(), delay);
        self
    }

    pub fn events(&self) -> Vec<FakeEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Task names in the order their actions started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Started(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Task names in the order their actions succeeded.
    pub fn finished(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FakeEvent::Finished(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Largest number of actions that were in flight at once.
    pub fn max_concurrency(&self) -> usize {
        self.state.lock().unwrap().max_running
    }

    /// The returned guard keeps the action counted as running until it is
    /// dropped, which also covers actions aborted mid-flight.
    fn record_start(&self, name: &str) -> Running<'_> {
        let mut state = self.state.lock().unwrap();
        state.events.push(FakeEvent::Started(name.to_string()));
        state.running += 1;
        state.max_running = state.max_running.max(state.running);
        Running(self)
    }

    fn record_end(&self, event: FakeEvent) {
        self.state.lock().unwrap().events.push(event);
    }
}

struct Running<'a>(&'a FakeBackend);

impl Drop for Running<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.running = state.running.saturating_sub(1);
    }
}

impl ActionBackend for FakeBackend {
    fn run_action<'a>(
        &'a self,
        task: &'a ScheduledTask,
        _action: &'a TaskAction,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let _running = self.record_start(&task.name);
            if let Some(delay) = self.delays.get(&task.name) {
                tokio::time::sleep(*delay).await;
            }
            if self.failing.contains(&task.name) {
                self.record_end(FakeEvent::Failed(task.name.clone()));
                return Err(anyhow::anyhow!("injected failure in {}", task.name).into());
            }
            self.record_end(FakeEvent::Finished(task.name.clone()));
            Ok(())
        })
    }
}
