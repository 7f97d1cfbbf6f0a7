// src/transform/sass.rs

use std::path::{Path, PathBuf};

use crate::errors::{CompilationError, ConfigError, Result};
use crate::transform::{
    Asset, BoxFuture, StepOptions, Transform, TransformContext, collect_compiled,
};

/// `sass`: compile `.scss` / `.sass` to CSS with `grass`.
///
/// Partials (`_name.scss`) are dropped; they are only reachable through
/// `@use`/`@import`. Other inputs (plain `.css`) pass through unchanged.
///
/// Options:
/// - `style`: `"expanded"` (default) or `"compressed"`.
/// - `load_paths`: extra root-relative import directories.
/// - `strict`: default `true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SassTransform;

fn parse_style(style: Option<&str>) -> std::result::Result<grass::OutputStyle, ConfigError> {
    match style {
        None | Some("expanded") => Ok(grass::OutputStyle::Expanded),
        Some("compressed") => Ok(grass::OutputStyle::Compressed),
        Some(other) => Err(ConfigError::Invalid(format!(
            "sass style must be 'expanded' or 'compressed', got '{other}'"
        ))),
    }
}

fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

fn compile_one(
    asset: Asset,
    root: &Path,
    style: grass::OutputStyle,
    load_paths: &[PathBuf],
) -> std::result::Result<Option<Asset>, CompilationError> {
    let syntax = match asset.extension() {
        Some("scss") => grass::InputSyntax::Scss,
        Some("sass") => grass::InputSyntax::Sass,
        _ => return Ok(Some(asset)),
    };
    if is_partial(&asset.path) {
        return Ok(None);
    }

    let source_dir = asset
        .source
        .as_deref()
        .and_then(Path::parent)
        .map(|dir| root.join(dir));

    let mut options = grass::Options::default().style(style).input_syntax(syntax);
    if let Some(dir) = &source_dir {
        options = options.load_path(dir);
    }
    for path in load_paths {
        options = options.load_path(path);
    }

    let input = asset.text()?.to_string();
    let css = grass::from_string(input, &options)
        .map_err(|e| CompilationError::new(asset.origin(), e.to_string()))?;

    Ok(Some(
        Asset {
            contents: css.into_bytes(),
            ..asset
        }
        .with_extension("css"),
    ))
}

impl Transform for SassTransform {
    fn name(&self) -> &str {
        "sass"
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        options: &'a StepOptions,
        ctx: &'a TransformContext,
    ) -> BoxFuture<'a, Result<Vec<Asset>>> {
        Box::pin(async move {
            let style = parse_style(options.get_str("style")?)?;
            let strict = options.strict()?;
            let load_paths: Vec<PathBuf> = options
                .get_str_list("load_paths")?
                .unwrap_or_default()
                .iter()
                .map(|p| ctx.root.join(p))
                .collect();
            let root = ctx.root.clone();

            // grass is CPU-bound and synchronous.
            let results = tokio::task::spawn_blocking(move || {
                assets
                    .into_iter()
                    .map(|asset| compile_one(asset, &root, style, &load_paths))
                    .collect::<Vec<_>>()
            })
            .await
            .map_err(|e| anyhow::anyhow!("sass worker panicked: {e}"))?;

            collect_compiled(results, strict, ctx, "sass")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::sync::Arc;

    fn ctx() -> TransformContext {
        TransformContext {
            task: "styles".to_string(),
            root: PathBuf::from("."),
            fs: Arc::new(MockFileSystem::new()),
        }
    }

    #[tokio::test]
    async fn compiles_scss_and_renames_to_css() {
        let out = SassTransform
            .apply(
                vec![Asset::new("main.scss", "$c: red;\na { color: $c; }\n")],
                &StepOptions::default(),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, PathBuf::from("main.css"));
        let css = String::from_utf8(out[0].contents.clone()).unwrap();
        assert!(css.contains("color: red"));
    }

    #[tokio::test]
    async fn partials_are_dropped_and_css_passes_through() {
        let out = SassTransform
            .apply(
                vec![
                    Asset::new("_vars.scss", "$c: red;"),
                    Asset::new("plain.css", "b{}"),
                ],
                &StepOptions::default(),
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(out, vec![Asset::new("plain.css", "b{}")]);
    }

    #[tokio::test]
    async fn syntax_error_names_the_file() {
        let err = SassTransform
            .apply(
                vec![Asset::new("bad.scss", "a { color: ").with_source("src/styles/bad.scss")],
                &StepOptions::default(),
                &ctx(),
            )
            .await
            .unwrap_err();
        match err {
            crate::errors::AssetdagError::Compilation(e) => {
                assert_eq!(e.file, PathBuf::from("src/styles/bad.scss"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_style_is_rejected() {
        assert!(parse_style(Some("nested")).is_err());
    }
}
