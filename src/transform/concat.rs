// src/transform/concat.rs

use crate::errors::{ConfigError, Result};
use crate::transform::{Asset, BoxFuture, StepOptions, Transform, TransformContext};

/// Joins all inputs, in order, into a single asset.
///
/// Options:
/// - `file` (required): output path of the bundle.
/// - `separator`: inserted between inputs, default `"\n"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatTransform;

impl ConcatTransform {
    fn concat(assets: Vec<Asset>, options: &StepOptions) -> Result<Vec<Asset>> {
        let file = options
            .get_str("file")?
            .ok_or_else(|| ConfigError::MissingOption("concat.file".to_string()))?;
        let separator = options.get_str("separator")?.unwrap_or("\n");

        if assets.is_empty() {
            return Ok(Vec::new());
        }

        let mut contents = Vec::new();
        for (i, asset) in assets.into_iter().enumerate() {
            if i > 0 {
                contents.extend_from_slice(separator.as_bytes());
            }
            contents.extend(asset.contents);
        }
        Ok(vec![Asset::new(file, contents)])
    }
}

impl Transform for ConcatTransform {
    fn name(&self) -> &str {
        "concat"
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        options: &'a StepOptions,
        _ctx: &'a TransformContext,
    ) -> BoxFuture<'a, Result<Vec<Asset>>> {
        Box::pin(async move { Self::concat(assets, options) })
    }
}
