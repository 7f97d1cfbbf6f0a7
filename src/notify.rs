// src/notify.rs

//! Best-effort desktop notifications.

use anyhow::{Context, Result, bail};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::model::NotifyConfig;
use crate::dag::TaskGraph;

/// Notification to send once a run of `target` succeeds.
///
/// Only the top-level target's own `notify` counts; notices on tasks in its
/// closure are not collected.
pub fn completion_notice<'g>(
    graph: &'g TaskGraph,
    target: &str,
    enabled: bool,
) -> Option<&'g NotifyConfig> {
    if !enabled {
        return None;
    }
    graph.node(target).and_then(|n| n.meta.notify.as_ref())
}

/// Program and arguments that would show `note` on this platform.
fn command_for(note: &NotifyConfig) -> Result<(String, Vec<String>)> {
    let body = match (&note.subtitle, &note.message) {
        (Some(sub), Some(msg)) => format!("{sub}\n{msg}"),
        (Some(sub), None) => sub.clone(),
        (None, Some(msg)) => msg.clone(),
        (None, None) => String::new(),
    };

    if cfg!(target_os = "macos") {
        let quote = |s: &str| s.replace('\\', "\\\\").replace('"', "\\\"");
        let mut script = format!(
            "display notification \"{}\" with title \"{}\"",
            quote(note.message.as_deref().unwrap_or_default()),
            quote(&note.title)
        );
        if let Some(sub) = &note.subtitle {
            script.push_str(&format!(" subtitle \"{}\"", quote(sub)));
        }
        Ok(("osascript".to_string(), vec!["-e".to_string(), script]))
    } else if cfg!(unix) {
        Ok(("notify-send".to_string(), vec![note.title.clone(), body]))
    } else {
        bail!("desktop notifications are not supported on this platform")
    }
}

async fn send(note: &NotifyConfig) -> Result<()> {
    let (program, args) = command_for(note)?;
    debug!(program = %program, "sending notification");
    let status = Command::new(&program)
        .args(&args)
        .status()
        .await
        .with_context(|| format!("running {program}"))?;
    if !status.success() {
        bail!("{program} exited with {status}");
    }
    Ok(())
}

/// Log `note` and try to show it. Never fails.
pub async fn notify(note: &NotifyConfig) {
    info!(
        title = %note.title,
        subtitle = note.subtitle.as_deref().unwrap_or_default(),
        message = note.message.as_deref().unwrap_or_default(),
        "notification"
    );
    if let Err(err) = send(note).await {
        warn!(error = %format!("{err:#}"), "notification failed; ignoring");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(all(unix, not(target_os = "macos")))]
    #[test]
    fn linux_uses_notify_send() {
        let note = NotifyConfig {
            title: "Build".into(),
            subtitle: Some("Deployed to the build folder".into()),
            message: Some("Ready to serve".into()),
        };
        let (program, args) = command_for(&note).unwrap();
        assert_eq!(program, "notify-send");
        assert_eq!(args[0], "Build");
        assert!(args[1].contains("Deployed"));
    }

    #[tokio::test]
    async fn missing_notifier_is_swallowed() {
        let note = NotifyConfig {
            title: "t".into(),
            subtitle: None,
            message: None,
        };
        // Must return regardless of whether a notifier is installed.
        notify(&note).await;
    }
}
