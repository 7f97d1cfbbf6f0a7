// src/inject.rs

//! Rewrites marker regions of an HTML document.
//!
//! ```html
//! <!-- inject:vendor -->
//! <script src="../bower_components/jquery/dist/jquery.js"></script>
//! <!-- endinject -->
//! ```
//!
//! Everything outside a filled region is left byte-for-byte unchanged, and
//! filling a region that already holds the same references is a no-op, so
//! injection is idempotent.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::dag::action::InjectAction;
use crate::errors::{ConfigError, Result};
use crate::fs::FileSystem;
use crate::fs::path_utils::{relative_between, to_slash};
use crate::glob::GlobResolver;

static START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*inject(?::([A-Za-z0-9_.:/\-]+))?\s*-->").expect("valid regex")
});
static END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<!--\s*endinject\s*-->").expect("valid regex"));

/// Files to reference from one region.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionTarget {
    /// `None` selects the default `<!-- inject -->` region.
    pub label: Option<String>,
    /// Root-relative paths, in injection order.
    pub files: Vec<PathBuf>,
    /// Reference template with a `{path}` placeholder. Without one the
    /// template is picked from the file extension.
    pub template: Option<String>,
}

#[derive(Debug)]
struct Region {
    label: Option<String>,
    indent: String,
    /// Byte range between the end of the start marker and the start of
    /// the end marker.
    content_start: usize,
    content_end: usize,
}

fn label_name(label: &Option<String>) -> &str {
    label.as_deref().unwrap_or("<default>")
}

/// Leading whitespace of the line containing `pos`, if the line has
/// nothing else before `pos`.
fn indent_before(document: &str, pos: usize) -> String {
    let line_start = document[..pos].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let prefix = &document[line_start..pos];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix.to_string()
    } else {
        String::new()
    }
}

fn scan_regions(document: &str, document_path: &Path) -> std::result::Result<Vec<Region>, ConfigError> {
    let mut regions: Vec<Region> = Vec::new();
    let mut search_from = 0;

    while let Some(start) = START_RE.captures_at(document, search_from) {
        let whole = start.get(0).map(|m| (m.start(), m.end())).unwrap_or_default();
        let label = start.get(1).map(|m| m.as_str().to_string());

        let end = END_RE.find_at(document, whole.1).ok_or_else(|| {
            ConfigError::Invalid(format!(
                "unterminated inject region '{}' in {}",
                label_name(&label),
                document_path.display()
            ))
        })?;
        if let Some(next) = START_RE.find_at(document, whole.1) {
            if next.start() < end.start() {
                return Err(ConfigError::Invalid(format!(
                    "unterminated inject region '{}' in {}",
                    label_name(&label),
                    document_path.display()
                )));
            }
        }
        if regions.iter().any(|r| r.label == label) {
            return Err(ConfigError::DuplicateMarker {
                document: document_path.to_path_buf(),
                label: label_name(&label).to_string(),
            });
        }

        regions.push(Region {
            indent: indent_before(document, whole.0),
            label,
            content_start: whole.1,
            content_end: end.start(),
        });
        search_from = end.end();
    }
    Ok(regions)
}

/// Reference line for `path` (already relative to the output document).
fn reference(path: &str, template: Option<&str>) -> std::result::Result<String, ConfigError> {
    if let Some(template) = template {
        return Ok(template.replace("{path}", path));
    }
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("js") | Some("mjs") => Ok(format!(r#"<script src="{path}"></script>"#)),
        Some("css") => Ok(format!(r#"<link rel="stylesheet" href="{path}">"#)),
        _ => Err(ConfigError::Invalid(format!(
            "no reference template for '{path}'; set `template` on the inject target"
        ))),
    }
}

/// Fill the regions named by `targets`.
///
/// - `document_path` is used in error messages only.
/// - `out_dir` is the directory the result will be written to; references
///   are made relative to it.
pub fn inject(
    document: &str,
    document_path: &Path,
    out_dir: &Path,
    targets: &[InjectionTarget],
) -> std::result::Result<String, ConfigError> {
    let regions = scan_regions(document, document_path)?;
    let newline = if document.contains("\r\n") { "\r\n" } else { "\n" };

    let mut replacements: Vec<(usize, usize, String)> = Vec::new();
    for target in targets {
        let Some(region) = regions.iter().find(|r| r.label == target.label) else {
            match &target.label {
                Some(label) => {
                    return Err(ConfigError::MissingMarker {
                        document: document_path.to_path_buf(),
                        label: label.clone(),
                    });
                }
                None => {
                    warn!(
                        document = %document_path.display(),
                        "no default <!-- inject --> region; leaving document unchanged"
                    );
                    continue;
                }
            }
        };

        let mut body = String::from(newline);
        for file in &target.files {
            let rel = to_slash(&relative_between(out_dir, file));
            body.push_str(&region.indent);
            body.push_str(&reference(&rel, target.template.as_deref())?);
            body.push_str(newline);
        }
        body.push_str(&region.indent);

        debug!(
            document = %document_path.display(),
            region = label_name(&target.label),
            files = target.files.len(),
            "filled inject region"
        );
        replacements.push((region.content_start, region.content_end, body));
    }

    replacements.sort_by_key(|(start, _, _)| *start);
    let mut out = String::with_capacity(document.len());
    let mut cursor = 0;
    for (start, end, body) in replacements {
        out.push_str(&document[cursor..start]);
        out.push_str(&body);
        cursor = end;
    }
    out.push_str(&document[cursor..]);
    Ok(out)
}

/// Execute an inject task: resolve every target, rewrite `document`, and
/// write it into `dest`. Returns the root-relative output path.
pub fn run_inject(fs: &dyn FileSystem, root: &Path, action: &InjectAction) -> Result<PathBuf> {
    let resolver = GlobResolver::new(fs, root);
    let targets = action
        .targets
        .iter()
        .map(|t| {
            let set = resolver.resolve(&t.src, &t.order)?;
            Ok(InjectionTarget {
                label: t.label.clone(),
                files: set.paths().map(Path::to_path_buf).collect(),
                template: t.template.clone(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let source = fs.read_to_string(&root.join(&action.document))?;
    let file_name = action.document.file_name().ok_or_else(|| {
        ConfigError::Invalid(format!(
            "inject document '{}' has no file name",
            action.document.display()
        ))
    })?;
    let out_path = action.dest.join(file_name);

    let rewritten = inject(&source, &action.document, &action.dest, &targets)?;
    fs.write_atomic(&root.join(&out_path), rewritten.as_bytes())?;
    Ok(out_path)
}
