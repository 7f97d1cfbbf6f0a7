// src/exec/task_runner.rs

//! Transform task execution: resolve, read, pipe, write.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::dag::action::TransformAction;
use crate::engine::TaskName;
use crate::errors::Result;
use crate::exec::backend::PipelineContext;
use crate::glob::GlobResolver;
use crate::transform::{TransformContext, read_assets, run_chain, write_assets};

/// Run one transform action and return the number of files written.
///
/// Nothing is written unless every step of the chain succeeds.
pub async fn run_transform(
    ctx: &PipelineContext,
    task: &TaskName,
    action: &TransformAction,
) -> Result<usize> {
    let fs = ctx.fs.as_ref();
    let set = GlobResolver::new(fs, &ctx.root).resolve(&action.src, &action.order)?;
    if set.is_empty() {
        warn!(task = %task, patterns = ?action.src, "no input files matched");
    }

    let assets = read_assets(fs, &ctx.root, &set)?;
    debug!(task = %task, inputs = assets.len(), "read transform inputs");

    let tctx = TransformContext {
        task: task.clone(),
        root: ctx.root.clone(),
        fs: Arc::clone(&ctx.fs),
    };
    let outputs = run_chain(&ctx.registry, &action.steps, assets, &tctx).await?;
    write_assets(fs, &ctx.root, &action.dest, &outputs)
}
