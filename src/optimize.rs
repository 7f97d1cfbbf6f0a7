// src/optimize.rs

//! Production bundling driven by build blocks in an HTML document.
//!
//! ```html
//! <!-- build:js js/lib.js -->
//! <script src="../bower_components/jquery/dist/jquery.js"></script>
//! <script src="../bower_components/angular/angular.js"></script>
//! <!-- endbuild -->
//! ```
//!
//! Every local reference inside a block is concatenated, in order, into the
//! block's target; the target goes through the adapter chain of the first
//! matching filter and is written under `dest`. The block itself is replaced
//! by a single reference to the target.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info};

use crate::dag::action::OptimizeAction;
use crate::engine::TaskName;
use crate::errors::{CompilationError, ConfigError, Result};
use crate::exec::{PipelineContext, run_blocking};
use crate::fs::FileSystem;
use crate::glob::compile_glob;
use crate::transform::{Asset, TransformContext, run_chain, write_assets};
use crate::types::BundleKind;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--\s*build:(\w+)\s+(\S+?)\s*-->(.*?)<!--\s*endbuild\s*-->")
        .expect("valid regex")
});
static REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:src|href)\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});

/// One `<!-- build:KIND TARGET -->` ... `<!-- endbuild -->` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBlock {
    pub kind: BundleKind,
    /// Bundle path, relative to the output document.
    pub target: String,
    /// Local references, in document order.
    pub references: Vec<String>,
    /// Remote references (`http:`, `https:`, `//`), kept as they are.
    pub remote: Vec<String>,
    indent: String,
    range: Range<usize>,
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://")
        || reference.starts_with("https://")
        || reference.starts_with("//")
}

/// Drop a `?query` or `#fragment` suffix.
fn strip_suffix(reference: &str) -> &str {
    reference
        .split(['?', '#'])
        .next()
        .unwrap_or(reference)
}

fn indent_of(document: &str, pos: usize) -> String {
    let line_start = document[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &document[line_start..pos];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix.to_string()
    } else {
        String::new()
    }
}

/// Find all build blocks in `document`.
pub fn parse_blocks(document: &str) -> std::result::Result<Vec<BuildBlock>, ConfigError> {
    let mut blocks = Vec::new();
    for caps in BLOCK_RE.captures_iter(document) {
        let (Some(whole), Some(kind), Some(target), Some(body)) =
            (caps.get(0), caps.get(1), caps.get(2), caps.get(3))
        else {
            continue;
        };
        let kind: BundleKind = kind.as_str().parse().map_err(ConfigError::Invalid)?;

        let mut references = Vec::new();
        let mut remote = Vec::new();
        for r in REF_RE.captures_iter(body.as_str()) {
            let Some(value) = r.get(1).map(|m| m.as_str().to_string()) else {
                continue;
            };
            if is_remote(&value) {
                remote.push(value);
            } else {
                references.push(value);
            }
        }

        blocks.push(BuildBlock {
            kind,
            target: target.as_str().to_string(),
            references,
            remote,
            indent: indent_of(document, whole.start()),
            range: whole.range(),
        });
    }
    Ok(blocks)
}

fn reference_line(kind: BundleKind, path: &str) -> String {
    match kind {
        BundleKind::Js => format!(r#"<script src="{path}"></script>"#),
        BundleKind::Css => format!(r#"<link rel="stylesheet" href="{path}">"#),
    }
}

/// Replace each block by its remote references followed by one reference
/// to the bundle.
pub fn rewrite_blocks(document: &str, blocks: &[BuildBlock]) -> String {
    let newline = if document.contains("\r\n") { "\r\n" } else { "\n" };
    let mut out = String::with_capacity(document.len());
    let mut cursor = 0;
    for block in blocks {
        out.push_str(&document[cursor..block.range.start]);
        for remote in &block.remote {
            out.push_str(&reference_line(block.kind, remote));
            out.push_str(newline);
            out.push_str(&block.indent);
        }
        out.push_str(&reference_line(block.kind, &block.target));
        cursor = block.range.end;
    }
    out.push_str(&document[cursor..]);
    out
}

/// First existing `search/reference`, root-relative.
fn locate(
    fs: &dyn FileSystem,
    root: &Path,
    search: &[PathBuf],
    reference: &str,
) -> Option<PathBuf> {
    let reference = strip_suffix(reference).trim_start_matches('/');
    search
        .iter()
        .map(|dir| dir.join(reference))
        .find(|candidate| fs.is_file(&root.join(candidate)))
}

/// Read `action.document` and concatenate the inputs of every build block,
/// one unprocessed bundle per block.
fn gather_bundles(
    fs: &dyn FileSystem,
    root: &Path,
    task: &str,
    action: &OptimizeAction,
) -> Result<(String, Vec<BuildBlock>, Vec<Asset>)> {
    let source = fs.read_to_string(&root.join(&action.document))?;
    let blocks = parse_blocks(&source)?;

    let mut bundles = Vec::with_capacity(blocks.len());
    for block in &blocks {
        for remote in &block.remote {
            info!(task, bundle = %block.target, reference = %remote, "remote reference left outside bundle");
        }

        let mut contents = Vec::new();
        for (i, reference) in block.references.iter().enumerate() {
            let path = locate(fs, root, &action.search, reference).ok_or_else(|| {
                CompilationError::new(
                    reference,
                    format!(
                        "referenced from {} but not found in search paths {:?}",
                        action.document.display(),
                        action.search
                    ),
                )
            })?;
            if i > 0 {
                contents.push(b'\n');
            }
            contents.extend(fs.read(&root.join(&path))?);
        }
        bundles.push(Asset::new(&block.target, contents));
    }
    Ok((source, blocks, bundles))
}

/// Execute an optimize task. Returns the number of bundles written.
///
/// Reads and writes run on the blocking pool; only the adapter chains run
/// on the async side.
pub async fn run_optimize(
    ctx: &PipelineContext,
    task: &TaskName,
    action: &OptimizeAction,
) -> Result<usize> {
    let file_name = action
        .document
        .file_name()
        .ok_or_else(|| {
            ConfigError::Invalid(format!(
                "optimize document '{}' has no file name",
                action.document.display()
            ))
        })?
        .to_owned();

    let filters = action
        .filters
        .iter()
        .map(|f| Ok((compile_glob(&f.pattern)?, &f.steps)))
        .collect::<std::result::Result<Vec<_>, ConfigError>>()?;

    let (fs, root, gather_task, gather_action) = (
        Arc::clone(&ctx.fs),
        ctx.root.clone(),
        task.clone(),
        action.clone(),
    );
    let (source, blocks, bundles) = run_blocking(move || {
        gather_bundles(fs.as_ref(), &root, &gather_task, &gather_action)
    })
    .await?;

    let tctx = TransformContext {
        task: task.clone(),
        root: ctx.root.clone(),
        fs: Arc::clone(&ctx.fs),
    };

    let mut outputs = Vec::new();
    for (block, bundle) in blocks.iter().zip(bundles) {
        let steps = filters
            .iter()
            .find(|(glob, _)| glob.is_match(&block.target))
            .map(|(_, steps)| steps.as_slice())
            .unwrap_or_default();

        debug!(
            task = %task,
            bundle = %block.target,
            inputs = block.references.len(),
            steps = steps.len(),
            "building bundle"
        );
        outputs.extend(run_chain(&ctx.registry, steps, vec![bundle], &tctx).await?);
    }

    let rewritten = rewrite_blocks(&source, &blocks);
    let count = blocks.len();
    let (fs, root, dest) = (Arc::clone(&ctx.fs), ctx.root.clone(), action.dest.clone());
    run_blocking(move || {
        write_assets(fs.as_ref(), &root, &dest, &outputs)?;
        fs.write_atomic(&root.join(&dest).join(&file_name), rewritten.as_bytes())?;
        Ok(())
    })
    .await?;

    Ok(count)
}
