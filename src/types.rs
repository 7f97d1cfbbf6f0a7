use std::str::FromStr;
use serde::Deserialize;

/// Behaviour when a watch trigger arrives while a run for the same task is
/// still in progress.
///
/// - `Cancel`: abort the stale run and start a fresh one (default). The
///   aborted run's output is never interleaved with the new one because every
///   file write is atomic.
/// - `Queue`: let the current run finish, then run once more. Any number of
///   triggers received meanwhile coalesce into that single extra run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    Queue,
    Cancel,
}

impl Default for TriggerWhileRunningBehaviour {
    fn default() -> Self {
        TriggerWhileRunningBehaviour::Cancel
    }
}

impl FromStr for TriggerWhileRunningBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(TriggerWhileRunningBehaviour::Queue),
            "cancel" => Ok(TriggerWhileRunningBehaviour::Cancel),
            other => Err(format!(
                "invalid triggered_while_running_behaviour: {other} (expected \"queue\" or \"cancel\")"
            )),
        }
    }
}

/// Kind of reference block inside an HTML document handled by the optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleKind {
    Css,
    Js,
}

impl FromStr for BundleKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "css" => Ok(BundleKind::Css),
            "js" => Ok(BundleKind::Js),
            other => Err(format!("unknown build block type: {other} (expected \"css\" or \"js\")")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behaviour_parses_case_insensitively() {
        assert_eq!(
            "Queue".parse::<TriggerWhileRunningBehaviour>(),
            Ok(TriggerWhileRunningBehaviour::Queue)
        );
        assert_eq!(
            " cancel ".parse::<TriggerWhileRunningBehaviour>(),
            Ok(TriggerWhileRunningBehaviour::Cancel)
        );
        assert!("drop".parse::<TriggerWhileRunningBehaviour>().is_err());
    }

    #[test]
    fn default_behaviour_is_cancel() {
        assert_eq!(
            TriggerWhileRunningBehaviour::default(),
            TriggerWhileRunningBehaviour::Cancel
        );
    }
}
