// src/transform/command.rs

//! Adapters backed by an external executable.
//!
//! Each asset is fed to the program on stdin; stdout becomes the new
//! contents. A `{file}` placeholder in an argument is replaced by the
//! absolute source path. A non-zero exit is a [`CompilationError`] carrying
//! the tool's stderr.
//!
//! `typescript` additionally type-checks the whole input set with `tsc`
//! before emitting anything, so a type error fails the step even though the
//! per-file emitter only transpiles.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, trace, warn};

use crate::errors::{CompilationError, ConfigError, Result};
use crate::fs::path_utils::to_slash;
use crate::transform::{
    Asset, BoxFuture, StepOptions, Transform, TransformContext, collect_compiled,
};

/// `file(line,col): error TSnnnn: message`, as printed by `tsc --pretty false`.
static TSC_DIAGNOSTIC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(.+?)\((\d+),(\d+)\): error (TS\d+: .*?)\r?$").expect("valid regex")
});

/// Program run once over every input before any file is emitted.
#[derive(Debug, Clone)]
struct Checker {
    program: String,
    args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CommandTransform {
    name: String,
    program: Option<String>,
    args: Vec<String>,
    /// Extension given to outputs, if the tool changes the file type.
    extension: Option<String>,
    /// Skip TypeScript declaration files (`*.d.ts`).
    skip_declarations: bool,
    checker: Option<Checker>,
}

impl CommandTransform {
    pub fn new(name: impl Into<String>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            program: Some(program.into()),
            args,
            extension: None,
            skip_declarations: false,
            checker: None,
        }
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = Some(ext.into());
        self
    }

    /// `typescript`: type-check with `tsc`, then transpile `.ts` to `.js`
    /// with esbuild.
    ///
    /// - `target` (e.g. `"es2018"`) is forwarded to esbuild as `--target`.
    /// - `typecheck = false` skips the `tsc` pass.
    /// - `checker` / `checker_args` replace the `tsc` program and flags; the
    ///   root-relative input paths are appended after them.
    pub fn typescript() -> Self {
        Self {
            name: "typescript".to_string(),
            program: Some("esbuild".to_string()),
            args: vec!["--loader=ts".to_string(), "--log-level=error".to_string()],
            extension: Some("js".to_string()),
            skip_declarations: true,
            checker: Some(Checker {
                program: "tsc".to_string(),
                args: ["--noEmit", "--noImplicitAny", "--pretty", "false"]
                    .map(String::from)
                    .to_vec(),
            }),
        }
    }

    /// `js-minify`: minify JavaScript with esbuild.
    pub fn js_minify() -> Self {
        Self {
            name: "js-minify".to_string(),
            program: Some("esbuild".to_string()),
            args: vec![
                "--minify".to_string(),
                "--loader=js".to_string(),
                "--log-level=error".to_string(),
            ],
            extension: None,
            skip_declarations: false,
            checker: None,
        }
    }

    /// `command`: any stdin-to-stdout tool named by the `program` option.
    pub fn generic() -> Self {
        Self {
            name: "command".to_string(),
            program: None,
            args: Vec::new(),
            extension: None,
            skip_declarations: false,
            checker: None,
        }
    }

    /// Program and argument list for one invocation, after applying options.
    fn invocation(&self, options: &StepOptions) -> Result<(String, Vec<String>)> {
        let program = match options.get_str("program")? {
            Some(p) => p.to_string(),
            None => self
                .program
                .clone()
                .ok_or_else(|| ConfigError::MissingOption(format!("{}.program", self.name)))?,
        };

        let mut args = match options.get_str_list("args")? {
            Some(args) => args,
            None => self.args.clone(),
        };
        if let Some(target) = options.get_str("target")? {
            args.push(format!("--target={target}"));
        }
        if let Some(extra) = options.get_str_list("extra_args")? {
            args.extend(extra);
        }
        Ok((program, args))
    }

    /// Checker program and argument list over `files`, or `None` when this
    /// adapter has no checker or `typecheck = false`.
    fn check_invocation(
        &self,
        options: &StepOptions,
        files: &[String],
    ) -> Result<Option<(String, Vec<String>)>> {
        let Some(checker) = &self.checker else {
            return Ok(None);
        };
        if files.is_empty() || options.get_bool("typecheck")? == Some(false) {
            return Ok(None);
        }
        let program = match options.get_str("checker")? {
            Some(p) => p.to_string(),
            None => checker.program.clone(),
        };
        let mut args = match options.get_str_list("checker_args")? {
            Some(args) => args,
            None => checker.args.clone(),
        };
        args.extend(files.iter().cloned());
        Ok(Some((program, args)))
    }

    /// Run the checker once. Diagnostics are grouped by root-relative file;
    /// an empty map means the check passed.
    async fn type_check(
        &self,
        program: &str,
        args: &[String],
        assets: &[Asset],
        ctx: &TransformContext,
    ) -> std::result::Result<BTreeMap<PathBuf, Vec<String>>, CompilationError> {
        let blame = assets
            .first()
            .map(|a| a.origin().to_path_buf())
            .unwrap_or_default();
        debug!(program, files = assets.len(), "type-checking");

        let output = Command::new(program)
            .args(args)
            .current_dir(&ctx.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| CompilationError::new(&blame, format!("failed to spawn '{program}': {e}")))?;

        if output.status.success() {
            return Ok(BTreeMap::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let diagnostics = parse_diagnostics(&stdout, &ctx.root);
        if diagnostics.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let text = [stdout.trim(), stderr.trim()].join("\n");
            let message = match text.trim() {
                "" => format!("'{program}' exited with {}", output.status),
                text => text.to_string(),
            };
            return Err(CompilationError::new(blame, message));
        }
        Ok(diagnostics)
    }

    async fn run_one(
        &self,
        program: &str,
        args: &[String],
        asset: Asset,
        ctx: &TransformContext,
    ) -> std::result::Result<Option<Asset>, CompilationError> {
        if self.skip_declarations && to_slash(&asset.path).ends_with(".d.ts") {
            trace!(file = %asset.path.display(), "skipping declaration file");
            return Ok(None);
        }

        let origin = asset.origin().to_path_buf();
        let file_arg = to_slash(&ctx.root.join(&origin));
        let args: Vec<String> = args.iter().map(|a| a.replace("{file}", &file_arg)).collect();

        debug!(program, ?args, file = %origin.display(), "running external tool");

        let mut child = Command::new(program)
            .args(&args)
            .current_dir(&ctx.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CompilationError::new(&origin, format!("failed to spawn '{program}': {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            let input = asset.contents.clone();
            // Written concurrently with reading stdout so large files cannot
            // deadlock on a full pipe.
            tokio::spawn(async move {
                let _ = stdin.write_all(&input).await;
            });
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CompilationError::new(&origin, format!("waiting for '{program}': {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("'{program}' exited with {}", output.status)
            } else {
                stderr
            };
            return Err(CompilationError::new(origin, message));
        }

        let mut out = Asset {
            contents: output.stdout,
            ..asset
        };
        if let Some(ext) = &self.extension {
            out = out.with_extension(ext);
        }
        Ok(Some(out))
    }
}

impl Transform for CommandTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply<'a>(
        &'a self,
        assets: Vec<Asset>,
        options: &'a StepOptions,
        ctx: &'a TransformContext,
    ) -> BoxFuture<'a, Result<Vec<Asset>>> {
        Box::pin(async move {
            let (program, args) = self.invocation(options)?;
            let strict = options.strict()?;

            let files: Vec<String> = assets.iter().map(|a| to_slash(a.origin())).collect();
            let mut assets = assets;
            if let Some((checker, check_args)) = self.check_invocation(options, &files)? {
                match self.type_check(&checker, &check_args, &assets, ctx).await {
                    Ok(diagnostics) if diagnostics.is_empty() => {}
                    Ok(diagnostics) if strict => {
                        let (file, messages) = diagnostics.into_iter().next().unwrap_or_default();
                        return Err(CompilationError::new(file, messages.join("\n")).into());
                    }
                    Ok(diagnostics) => {
                        for (file, messages) in &diagnostics {
                            warn!(
                                task = %ctx.task,
                                adapter = %self.name,
                                file = %file.display(),
                                error = %messages.join("; "),
                                "type check failed; dropping file (strict = false)"
                            );
                        }
                        assets.retain(|a| !diagnostics.contains_key(a.origin()));
                    }
                    Err(err) if strict => return Err(err.into()),
                    Err(err) => {
                        warn!(
                            task = %ctx.task,
                            adapter = %self.name,
                            error = %err.message,
                            "type check could not run; emitting unchecked (strict = false)"
                        );
                    }
                }
            }

            let mut results = Vec::with_capacity(assets.len());
            for asset in assets {
                let result = self.run_one(&program, &args, asset, ctx).await;
                let failed = result.is_err();
                results.push(result);
                if failed && strict {
                    break;
                }
            }
            collect_compiled(results, strict, ctx, &self.name)
        })
    }
}

/// Group `tsc` diagnostics by file. Absolute paths under `root` are made
/// root-relative so they compare equal to asset origins.
fn parse_diagnostics(output: &str, root: &Path) -> BTreeMap<PathBuf, Vec<String>> {
    let mut by_file: BTreeMap<PathBuf, Vec<String>> = BTreeMap::new();
    for cap in TSC_DIAGNOSTIC_RE.captures_iter(output) {
        let path = PathBuf::from(cap[1].trim());
        let path = match path.strip_prefix(root) {
            Ok(rel) => rel.to_path_buf(),
            Err(_) => path,
        };
        by_file
            .entry(path)
            .or_default()
            .push(format!("{}:{} {}", &cap[2], &cap[3], &cap[4]));
    }
    by_file
}
