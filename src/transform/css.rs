// src/transform/css.rs

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};

use crate::errors::{CompilationError, Result};
use crate::transform::{
    Asset, BoxFuture, StepOptions, Transform, TransformContext, collect_compiled,
};

/// `css-minify`: minify stylesheets with `lightningcss`. Non-CSS inputs
/// pass through.
#[derive(Debug, Clone, Copy, Default)]
pub struct CssMinifyTransform;

fn minify_css(code: &str) -> std::result::Result<String, String> {
    let mut sheet = StyleSheet::parse(code, ParserOptions::default()).map_err(|e| e.to_string())?;
    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| e.to_string())?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(printed.code)
}

fn minify_one(asset: Asset) -> std::result::Result<Option<Asset>, CompilationError> {
    if asset.extension() != Some("css") {
        return Ok(Some(asset));
    }
    let code = minify_css(asset.text()?).map_err(|msg| CompilationError::new(asset.origin(), msg))?;
    Ok(Some(Asset {
        contents: code.into_bytes(),
        ..asset
    }))
}

impl Transform for CssMinifyTransform {
    fn name(&self) -> &str {
        "css-minify"
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        options: &'a StepOptions,
        ctx: &'a TransformContext,
    ) -> BoxFuture<'a, Result<Vec<Asset>>> {
        Box::pin(async move {
            let strict = options.strict()?;
            let results = assets.into_iter().map(minify_one).collect();
            collect_compiled(results, strict, ctx, "css-minify")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removes_whitespace() {
        let out = minify_css("a {\n  color: #ff0000;\n}\n").unwrap();
        assert_eq!(out, "a{color:red}");
    }

    #[test]
    fn non_css_passes_through() {
        let asset = Asset::new("app.js", "var a = 1;");
        assert_eq!(minify_one(asset.clone()).unwrap(), Some(asset));
    }
}
