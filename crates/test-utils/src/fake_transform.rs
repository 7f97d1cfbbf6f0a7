use assetdag::errors::{CompilationError, Result};
use assetdag::transform::{Asset, BoxFuture, StepOptions, Transform, TransformContext};

/// Stand-in for the TypeScript compiler: `.ts` becomes `.js` with a
/// marker line prepended. Inputs whose text contains `SYNTAX ERROR` fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct FakeTypescript;

impl FakeTypescript {
    fn compile(asset: Asset) -> std::result::Result<Asset, CompilationError> {
        let text = asset.text()?;
        if text.contains("SYNTAX ERROR") {
            return Err(CompilationError::new(asset.origin(), "unexpected token"));
        }
        let mut contents = b"// compiled\n".to_vec();
        contents.extend_from_slice(text.as_bytes());
        Ok(Asset {
            contents,
            ..asset
        }
        .with_extension("js"))
    }
}

impl Transform for FakeTypescript {
    fn name(&self) -> &str {
        "typescript"
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        _options: &'a StepOptions,
        _ctx: &'a TransformContext,
    ) -> BoxFuture<'a, Result<Vec<Asset>>> {
        Box::pin(async move {
            assets
                .into_iter()
                .map(|a| Self::compile(a).map_err(Into::into))
                .collect()
        })
    }
}

/// Upper-cases every input; handy for checking chain order.
#[derive(Debug, Clone, Copy, Default)]
pub struct Uppercase;

impl Transform for Uppercase {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        _options: &'a StepOptions,
        _ctx: &'a TransformContext,
    ) -> BoxFuture<'a, Result<Vec<Asset>>> {
        Box::pin(async move {
            Ok(assets
                .into_iter()
                .map(|mut a| {
                    a.contents.make_ascii_uppercase();
                    a
                })
                .collect())
        })
    }
}
