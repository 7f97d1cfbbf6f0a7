// src/watch/patterns.rs

use globset::GlobSet;

use crate::errors::ConfigError;
use crate::glob::compile_globset;

/// Compiled watch patterns: positive globs plus `!` excludes.
#[derive(Debug, Clone)]
pub struct WatchPatterns {
    include: GlobSet,
    exclude: Option<GlobSet>,
    raw: Vec<String>,
}

impl WatchPatterns {
    pub fn new(patterns: &[String]) -> Result<Self, ConfigError> {
        let (negative, positive): (Vec<String>, Vec<String>) =
            patterns.iter().cloned().partition(|p| p.starts_with('!'));
        if positive.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "watch patterns {patterns:?} contain no positive pattern"
            )));
        }

        let excludes: Vec<String> = negative
            .iter()
            .map(|p| p.trim_start_matches('!').to_string())
            .collect();
        Ok(Self {
            include: compile_globset(&positive)?,
            exclude: if excludes.is_empty() {
                None
            } else {
                Some(compile_globset(&excludes)?)
            },
            raw: patterns.to_vec(),
        })
    }

    /// Whether a root-relative, `/`-separated path is watched.
    pub fn matches(&self, rel: &str) -> bool {
        let rel = rel.trim_start_matches("./");
        self.include.is_match(rel) && !self.exclude.as_ref().is_some_and(|ex| ex.is_match(rel))
    }

    pub fn patterns(&self) -> &[String] {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns(items: &[&str]) -> WatchPatterns {
        WatchPatterns::new(&items.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn matches_relative_paths() {
        let p = patterns(&["src/client/**/*.ts", "!src/client/**/*.d.ts"]);
        assert!(p.matches("src/client/app/main.ts"));
        assert!(p.matches("./src/client/main.ts"));
        assert!(!p.matches("src/client/typings/x.d.ts"));
        assert!(!p.matches("src/server/main.ts"));
    }

    #[test]
    fn only_negations_is_rejected() {
        let err = WatchPatterns::new(&["!a/**".to_string()]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
