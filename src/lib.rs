// src/lib.rs

pub mod clean;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod glob;
pub mod inject;
pub mod logging;
pub mod notify;
pub mod optimize;
pub mod pipeline;
pub mod transform;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch as signal;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{default_config_path, load_and_validate, project_root};
use crate::dag::TaskGraph;
use crate::engine::{CancelHandle, Runner, WatchHub};
use crate::errors::AssetdagError;
use crate::exec::{PipelineBackend, PipelineContext};
use crate::fs::RealFileSystem;
use crate::transform::AdapterRegistry;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and validation
/// - adapter registry and task graph
/// - the runner with the production backend
/// - Ctrl-C handling
/// - the completion notification
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let cfg = load_and_validate(&config_path)?;
    let root = project_root(&config_path);

    let registry = AdapterRegistry::with_defaults();
    let graph = Arc::new(pipeline::build_graph(&cfg, &registry).map_err(AssetdagError::from)?);

    let requested = args.task.as_deref().or(cfg.config.default_task.as_deref());
    let target = match requested {
        Some(name) if !args.list && name != "help" => name.to_string(),
        _ => {
            print_task_list(&graph);
            return Ok(());
        }
    };
    if !graph.contains(&target) {
        return Err(AssetdagError::TaskNotFound(target).into());
    }

    if args.dry_run {
        print_dry_run(&graph, &target)?;
        return Ok(());
    }

    // Ctrl-C: watches stop on the shutdown signal, anything else in flight
    // is aborted through the run's cancel handle.
    let (shutdown_tx, shutdown_rx) = signal::channel(false);
    let (cancel, cancel_rx) = CancelHandle::pair();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("interrupted; shutting down");
        let _ = shutdown_tx.send(true);
        cancel.cancel();
    });

    let backend = PipelineBackend::new(PipelineContext {
        root,
        fs: Arc::new(RealFileSystem),
        registry,
        graph: Arc::clone(&graph),
        shutdown: shutdown_rx,
        watch_hub: WatchHub::new(),
    });
    let runner = Runner::new(Arc::clone(&graph), backend);

    let report = runner.execute(&target, Some(cancel_rx)).await?;
    for (watched, summary) in runner.backend().context().watch_hub.join().await {
        if let Err(err) = summary {
            warn!(task = %watched, error = %err, "watch loop ended with an error");
        }
    }
    if report.cancelled {
        return Ok(());
    }
    if !report.failed.is_empty() {
        return Err(AssetdagError::TasksFailed {
            failed: report.failed,
        }
        .into());
    }

    let enabled = cfg.config.notifications && !args.no_notify;
    if let Some(note) = notify::completion_notice(&graph, &target, enabled) {
        notify::notify(note).await;
    }
    Ok(())
}

/// `--list` / `help` output: every task with its description.
fn print_task_list(graph: &TaskGraph) {
    let width = graph.names().map(str::len).max().unwrap_or(0);
    println!("tasks ({}):", graph.len());
    for node in graph.nodes() {
        let kind = node.action.as_ref().map(|a| a.kind()).unwrap_or("group");
        match &node.meta.description {
            Some(desc) => println!("  {:<width$}  [{kind}] {desc}", node.name),
            None => println!("  {:<width$}  [{kind}]", node.name),
        }
    }
}

/// Simple dry-run output: the order `target`'s closure would run in.
fn print_dry_run(graph: &TaskGraph, target: &str) -> Result<()> {
    let order = graph.execution_order(target)?;
    println!("assetdag dry-run: {target}");
    for (i, name) in order.iter().enumerate() {
        let Some(node) = graph.node(name) else {
            continue;
        };
        let kind = node.action.as_ref().map(|a| a.kind()).unwrap_or("group");
        println!("  {:>2}. {name} [{kind}]", i + 1);
        if !node.dependencies.is_empty() {
            println!("      after: {:?}", node.dependencies);
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
