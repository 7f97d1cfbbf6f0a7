// src/config/interpolate.rs

//! Variable expansion for paths and pattern lists.
//!
//! - `{name}` is replaced by `[paths].name`; `{optimized.app}` and
//!   `{optimized.lib}` by the `[optimized]` entries.
//! - Braces containing a comma (`*.{js,css}`) are glob alternation and are
//!   left alone.
//! - A pattern list entry `"@name"` (or `"!@name"`) is replaced by the
//!   expanded entries of `[globs].name` (negated when prefixed with `!`).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::ConfigFile;
use crate::errors::ConfigError;

static VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_.\-]*)\}").expect("valid regex"));

/// Lookup table of everything that can appear inside `{...}`.
#[derive(Debug, Clone, Default)]
pub struct Vars {
    values: BTreeMap<String, String>,
    globs: BTreeMap<String, Vec<String>>,
}

impl Vars {
    pub fn new(
        paths: &BTreeMap<String, String>,
        optimized_app: Option<&str>,
        optimized_lib: Option<&str>,
        globs: &BTreeMap<String, Vec<String>>,
    ) -> Self {
        let mut values = paths.clone();
        if let Some(app) = optimized_app {
            values.insert("optimized.app".to_string(), app.to_string());
        }
        if let Some(lib) = optimized_lib {
            values.insert("optimized.lib".to_string(), lib.to_string());
        }
        Self {
            values,
            globs: globs.clone(),
        }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(
            &cfg.paths,
            cfg.optimized.app.as_deref(),
            cfg.optimized.lib.as_deref(),
            &cfg.globs,
        )
    }

    /// Expand `{name}` variables in a single string.
    ///
    /// Values of `[paths]` may themselves reference other paths; expansion is
    /// repeated up to a small depth so `build_js = "{build}js/"` works.
    pub fn expand(&self, input: &str) -> Result<String, ConfigError> {
        let mut current = input.to_string();
        for _ in 0..8 {
            if !VAR_RE.is_match(&current) {
                return Ok(current);
            }
            let mut missing = None;
            let next = VAR_RE
                .replace_all(&current, |caps: &regex::Captures<'_>| {
                    let name = &caps[1];
                    match self.values.get(name) {
                        Some(value) => value.clone(),
                        None => {
                            missing.get_or_insert_with(|| name.to_string());
                            String::new()
                        }
                    }
                })
                .into_owned();
            if let Some(name) = missing {
                return Err(ConfigError::MissingOption(option_key(&name)));
            }
            current = next;
        }
        Err(ConfigError::Invalid(format!(
            "variable expansion of '{input}' does not terminate"
        )))
    }

    /// Expand a pattern list: `@name` references first, then variables.
    pub fn expand_patterns(&self, patterns: &[String]) -> Result<Vec<String>, ConfigError> {
        let mut out = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let (negated, body) = match pattern.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, pattern.as_str()),
            };

            if let Some(name) = body.strip_prefix('@') {
                let list = self
                    .globs
                    .get(name)
                    .ok_or_else(|| ConfigError::MissingOption(format!("globs.{name}")))?;
                for entry in list {
                    if entry.starts_with('@') || entry.starts_with("!@") {
                        return Err(ConfigError::Invalid(format!(
                            "glob list '{name}' may not reference other glob lists ('{entry}')"
                        )));
                    }
                    let expanded = self.expand(entry)?;
                    out.push(negate_if(negated, expanded));
                }
            } else {
                out.push(negate_if(negated, self.expand(body)?));
            }
        }
        Ok(out)
    }
}

fn negate_if(negated: bool, pattern: String) -> String {
    match (negated, pattern.strip_prefix('!')) {
        (false, _) => pattern,
        // `!` applied to an already negated entry cancels out.
        (true, Some(rest)) => rest.to_string(),
        (true, None) => format!("!{pattern}"),
    }
}

fn option_key(name: &str) -> String {
    if name.starts_with("optimized.") {
        name.to_string()
    } else {
        format!("paths.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> Vars {
        let mut paths = BTreeMap::new();
        paths.insert("temp".to_string(), ".tmp/".to_string());
        paths.insert("client".to_string(), "src/client/".to_string());
        paths.insert("app".to_string(), "{client}app/".to_string());
        let mut globs = BTreeMap::new();
        globs.insert(
            "ts".to_string(),
            vec!["{app}**/*.ts".to_string(), "!{app}**/*.spec.ts".to_string()],
        );
        Vars::new(&paths, Some("app.js"), None, &globs)
    }

    #[test]
    fn expands_nested_path_variables() {
        assert_eq!(vars().expand("{app}main.ts").unwrap(), "src/client/app/main.ts");
        assert_eq!(vars().expand("**/{optimized.app}").unwrap(), "**/app.js");
    }

    #[test]
    fn leaves_glob_alternation_alone() {
        assert_eq!(vars().expand("{temp}*.{js,css}").unwrap(), ".tmp/*.{js,css}");
    }

    #[test]
    fn unknown_variable_is_a_missing_option() {
        assert_eq!(
            vars().expand("{build}index.html"),
            Err(ConfigError::MissingOption("paths.build".to_string()))
        );
        assert_eq!(
            vars().expand("**/{optimized.lib}"),
            Err(ConfigError::MissingOption("optimized.lib".to_string()))
        );
    }

    #[test]
    fn expands_glob_references_and_negation() {
        let out = vars()
            .expand_patterns(&["@ts".to_string(), "{temp}x.js".to_string()])
            .unwrap();
        assert_eq!(
            out,
            vec![
                "src/client/app/**/*.ts".to_string(),
                "!src/client/app/**/*.spec.ts".to_string(),
                ".tmp/x.js".to_string(),
            ]
        );

        let negated = vars().expand_patterns(&["!@ts".to_string()]).unwrap();
        assert_eq!(
            negated,
            vec![
                "!src/client/app/**/*.ts".to_string(),
                "src/client/app/**/*.spec.ts".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_glob_list_is_a_missing_option() {
        assert_eq!(
            vars().expand_patterns(&["@fonts".to_string()]),
            Err(ConfigError::MissingOption("globs.fonts".to_string()))
        );
    }
}
