// src/watch/debounce.rs

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::watch::hash::HashGate;

/// Collapse bursts of change events into single triggers.
///
/// After the first event, further events are absorbed until `window`
/// passes with none; then one trigger is sent. With a [`HashGate`], bursts
/// that leave the watched content unchanged send nothing.
///
/// Returns when `events` closes (after flushing a pending burst) or when
/// the trigger receiver is dropped.
pub async fn debounce_changes(
    mut events: mpsc::UnboundedReceiver<PathBuf>,
    triggers: mpsc::Sender<()>,
    window: Duration,
    mut gate: Option<HashGate>,
) {
    while let Some(first) = events.recv().await {
        let mut burst: BTreeSet<PathBuf> = BTreeSet::from([first]);
        loop {
            match tokio::time::timeout(window, events.recv()).await {
                Ok(Some(path)) => {
                    burst.insert(path);
                }
                Ok(None) | Err(_) => break,
            }
        }
        debug!(files = ?burst, "change burst coalesced");

        if let Some(gate) = gate.as_mut() {
            match gate.changed() {
                Ok(false) => {
                    debug!("watched content unchanged; skipping trigger");
                    continue;
                }
                Ok(true) => {}
                Err(err) => warn!(error = %err, "hashing watched files failed; triggering anyway"),
            }
        }

        if triggers.send(()).await.is_err() {
            debug!("trigger receiver dropped; stopping debouncer");
            return;
        }
    }
}
