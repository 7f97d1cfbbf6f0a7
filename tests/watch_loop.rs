// tests/watch_loop.rs

mod common;

use std::sync::Arc;
use std::time::Duration;

use assetdag::engine::{Runner, WatchHub, WatchLoop};
use assetdag::types::TriggerWhileRunningBehaviour;
use assetdag_test_utils::builders::graph_of;
use assetdag_test_utils::fake_backend::FakeBackend;
use common::{init_tracing, with_timeout};
use tokio::sync::{mpsc, oneshot};

fn build_graph_runner(backend: &FakeBackend) -> Runner<FakeBackend> {
    let graph = Arc::new(graph_of(&[("compile", &[]), ("inject", &["compile"])]));
    Runner::new(graph, backend.clone())
}

#[tokio::test]
async fn cancel_restarts_on_mid_run_trigger() {
    init_tracing();
    let backend = FakeBackend::new().delay("compile", Duration::from_millis(200));
    let watch = WatchLoop::new(
        build_graph_runner(&backend),
        "inject".into(),
        TriggerWhileRunningBehaviour::Cancel,
    );

    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(watch.run(rx, std::future::pending::<()>()));

    tx.send(()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(tx);

    let summary = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(summary.runs_started, 2);
    assert_eq!(summary.runs_cancelled, 1);
    assert!(summary.last_report.as_ref().is_some_and(|r| r.succeeded()));
    assert_eq!(backend.started(), vec!["compile", "compile", "inject"]);
    assert_eq!(backend.finished(), vec!["compile", "inject"]);
}

#[tokio::test]
async fn queue_runs_once_more_after_the_current_run() {
    let backend = FakeBackend::new().delay("compile", Duration::from_millis(100));
    let watch = WatchLoop::new(
        build_graph_runner(&backend),
        "inject".into(),
        TriggerWhileRunningBehaviour::Queue,
    );

    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(watch.run(rx, std::future::pending::<()>()));

    tx.send(()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Three triggers during the run coalesce into one follow-up run.
    for _ in 0..3 {
        tx.send(()).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(tx);

    let summary = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(summary.runs_started, 2);
    assert_eq!(summary.runs_cancelled, 0);
    assert_eq!(backend.finished(), vec!["compile", "inject", "compile", "inject"]);
}

#[tokio::test]
async fn failed_run_keeps_watching() {
    let backend = FakeBackend::new().failing("compile");
    let watch = WatchLoop::new(
        build_graph_runner(&backend),
        "inject".into(),
        TriggerWhileRunningBehaviour::Cancel,
    );

    let (tx, rx) = mpsc::channel(8);
    let handle = tokio::spawn(watch.run(rx, std::future::pending::<()>()));
    tx.send(()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).await.unwrap();
    drop(tx);

    let summary = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(summary.runs_started, 2);
    assert_eq!(summary.runs_failed, 2);
    assert!(!backend.started().contains(&"inject".to_string()));
}

#[tokio::test]
async fn shutdown_cancels_the_active_run() {
    let backend = FakeBackend::new().delay("compile", Duration::from_secs(30));
    let watch = WatchLoop::new(
        build_graph_runner(&backend),
        "inject".into(),
        TriggerWhileRunningBehaviour::Cancel,
    );

    let (tx, rx) = mpsc::channel(8);
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(watch.run(rx, async move {
        let _ = stop_rx.await;
    }));

    tx.send(()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let summary = with_timeout(handle).await.unwrap().unwrap();
    assert_eq!(summary.runs_started, 1);
    assert_eq!(summary.runs_cancelled, 1);
    assert!(backend.finished().is_empty());
    drop(tx);
}

#[tokio::test]
async fn watchers_of_one_target_share_a_loop_under_cancel() {
    let backend = FakeBackend::new().delay("compile", Duration::from_millis(100));
    let runner = build_graph_runner(&backend);
    let hub = WatchHub::new();
    let behaviour = TriggerWhileRunningBehaviour::Cancel;

    let scripts = hub.subscribe(&runner, "inject", behaviour, std::future::pending::<()>());
    let styles = hub.subscribe(&runner, "inject", behaviour, std::future::pending::<()>());

    scripts.send(()).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    styles.send(()).await.unwrap();
    drop((scripts, styles));

    let summaries = with_timeout(hub.join()).await;
    assert_eq!(summaries.len(), 1);
    let (target, summary) = &summaries[0];
    assert_eq!(target, "inject");
    let summary = summary.as_ref().unwrap();
    assert_eq!(summary.runs_started, 2);
    assert_eq!(summary.runs_cancelled, 1);
    assert_eq!(backend.max_concurrency(), 1);
    assert_eq!(backend.finished(), vec!["compile", "inject"]);
}

#[tokio::test]
async fn watchers_of_one_target_share_a_loop_under_queue() {
    let backend = FakeBackend::new().delay("compile", Duration::from_millis(60));
    let runner = build_graph_runner(&backend);
    let hub = WatchHub::new();
    let behaviour = TriggerWhileRunningBehaviour::Queue;

    let scripts = hub.subscribe(&runner, "inject", behaviour, std::future::pending::<()>());
    let styles = hub.subscribe(&runner, "inject", behaviour, std::future::pending::<()>());

    scripts.send(()).await.unwrap();
    styles.send(()).await.unwrap();
    drop((scripts, styles));

    let summaries = with_timeout(hub.join()).await;
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].1.as_ref().unwrap().runs_started, 2);
    assert_eq!(backend.max_concurrency(), 1);
    assert_eq!(backend.finished(), vec!["compile", "inject", "compile", "inject"]);
}

#[tokio::test]
async fn distinct_targets_get_their_own_loops() {
    let backend = FakeBackend::new();
    let runner = build_graph_runner(&backend);
    let hub = WatchHub::new();
    let behaviour = TriggerWhileRunningBehaviour::Cancel;

    let inject = hub.subscribe(&runner, "inject", behaviour, std::future::pending::<()>());
    let compile = hub.subscribe(&runner, "compile", behaviour, std::future::pending::<()>());
    drop((inject, compile));

    let targets: Vec<String> = with_timeout(hub.join())
        .await
        .into_iter()
        .map(|(target, _)| target)
        .collect();
    assert_eq!(targets, vec!["inject", "compile"]);
}
