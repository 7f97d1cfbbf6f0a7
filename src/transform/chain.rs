// src/transform/chain.rs

//! Reading inputs, piping them through adapters, writing outputs.

use std::path::Path;

use tracing::{debug, info};

use crate::errors::{ConfigError, Result};
use crate::fs::FileSystem;
use crate::glob::FileSet;
use crate::transform::{AdapterRegistry, Asset, Step, TransformContext};

/// Load every file of `set` into memory. Asset paths are relative to the
/// glob base of the pattern that matched them.
pub fn read_assets(fs: &dyn FileSystem, root: &Path, set: &FileSet) -> Result<Vec<Asset>> {
    set.entries()
        .iter()
        .map(|entry| {
            let contents = fs.read(&root.join(&entry.path))?;
            Ok(Asset::new(entry.relative(), contents).with_source(&entry.path))
        })
        .collect()
}

/// Pipe `assets` through `steps` in order. The output of step *n* is the
/// input of step *n + 1*; the first error aborts the chain.
pub async fn run_chain(
    registry: &AdapterRegistry,
    steps: &[Step],
    mut assets: Vec<Asset>,
    ctx: &TransformContext,
) -> Result<Vec<Asset>> {
    for step in steps {
        let adapter = registry
            .get(&step.adapter)
            .ok_or_else(|| ConfigError::UnknownAdapter {
                task: ctx.task.clone(),
                adapter: step.adapter.clone(),
            })?;

        let inputs = assets.len();
        assets = adapter.apply(assets, &step.options, ctx).await?;
        debug!(
            task = %ctx.task,
            adapter = %step.adapter,
            inputs,
            outputs = assets.len(),
            "adapter step finished"
        );
    }
    Ok(assets)
}

/// Write `assets` under `root/dest`, each at its own relative path.
///
/// Called only once the whole chain has succeeded, so a failing chain
/// leaves previously written outputs untouched.
pub fn write_assets(
    fs: &dyn FileSystem,
    root: &Path,
    dest: &Path,
    assets: &[Asset],
) -> Result<usize> {
    let out_dir = root.join(dest);
    for asset in assets {
        let target = out_dir.join(&asset.path);
        fs.write_atomic(&target, &asset.contents)?;
    }
    info!(
        dest = %dest.display(),
        files = assets.len(),
        "wrote assets"
    );
    Ok(assets.len())
}
