//! Completion reconciliation
//!
//! The embedded provider frame signals completion over three unreliable
//! channels and the first one to report wins:
//!
//! 1. a structured `SIGNING_EVENT` message relayed from the host's own
//!    callback bridge (same origin, trusted shape),
//! 2. raw messages posted by the provider frame itself (shape varies by
//!    provider and version; matched heuristically),
//! 3. a session poll against the server, as the fallback when no message
//!    arrives at all.
//!
//! The watcher owns all three: cancelling the handle tears down the
//! message intake and the poll loop together, so no channel outlives a
//! session the caller abandoned.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::session::SessionStep;
use crate::transport::SessionTransport;

/// Message type of the trusted callback-bridge relay.
pub const SIGNING_EVENT_TYPE: &str = "SIGNING_EVENT";

/// Cadence of the fallback session poll while the provider frame is open.
pub const COMPLETION_POLL_PERIOD: Duration = Duration::from_secs(10);

/// Terminal outcome of the provider signing ceremony.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningOutcome {
    Signed,
    Declined,
}

/// One message received while the provider frame is open.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// Origin the message was posted from.
    pub origin: String,
    /// Whether the message's source is the embedded provider frame.
    pub from_signing_frame: bool,
    pub data: Value,
}

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// The host page's own origin; messages from it carry the trusted
    /// bridge shape.
    pub host_origin: String,
    pub poll_period: Duration,
}

impl WatchConfig {
    pub fn new(host_origin: impl Into<String>) -> Self {
        Self {
            host_origin: host_origin.into(),
            poll_period: COMPLETION_POLL_PERIOD,
        }
    }
}

/// Classify a single message against both message channels. Returns
/// `None` for anything that is not a recognizable terminal signal;
/// unrecognized messages are ignored, never errors.
pub fn classify_message(event: &MessageEvent, host_origin: &str) -> Option<SigningOutcome> {
    // Trusted bridge relay: exact origin, exact shape.
    if event.origin == host_origin {
        if event.data.get("type").and_then(Value::as_str) == Some(SIGNING_EVENT_TYPE) {
            return match event.data.get("status").and_then(Value::as_str) {
                Some("signed") => Some(SigningOutcome::Signed),
                Some("declined") => Some(SigningOutcome::Declined),
                _ => None,
            };
        }
        return None;
    }

    // Provider frame: origin varies across providers and redirect hops,
    // so identification is by source, and only the message text is
    // inspected. A stray match costs one redundant server confirmation,
    // nothing more.
    if event.from_signing_frame {
        for key in ["type", "event"] {
            if let Some(text) = event.data.get(key).and_then(Value::as_str) {
                if let Some(outcome) = provider_event_outcome(text) {
                    return Some(outcome);
                }
            }
        }
    }

    None
}

/// Substring heuristic for provider-authored event names. Positive
/// matches are checked before negative ones so compound names such as
/// "signing_completed_after_decline_reversal" resolve as signed.
fn provider_event_outcome(text: &str) -> Option<SigningOutcome> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("completed") || lower.contains("signed") {
        return Some(SigningOutcome::Signed);
    }
    if lower.contains("rejected") || lower.contains("declined") {
        return Some(SigningOutcome::Declined);
    }
    None
}

/// Handle to a running completion watch. Dropping it aborts the watcher,
/// which tears down message intake and the poll loop at once.
pub struct CompletionWatch {
    task: JoinHandle<()>,
}

impl CompletionWatch {
    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for CompletionWatch {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start watching for the terminal signing outcome.
///
/// Resolves the returned receiver exactly once, with whichever channel
/// reports first. A `Signed` outcome additionally fires one best-effort
/// completion notification to the server; its failure is swallowed, the
/// poll reconciles the record later.
pub fn watch_for_completion<T>(
    transport: Arc<T>,
    token: impl Into<String>,
    config: WatchConfig,
    mut messages: mpsc::UnboundedReceiver<MessageEvent>,
) -> (CompletionWatch, oneshot::Receiver<SigningOutcome>)
where
    T: SessionTransport + ?Sized + 'static,
{
    let token = token.into();
    let (outcome_tx, outcome_rx) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.poll_period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval fires immediately; consume
        // it so the first real poll happens one period in.
        interval.tick().await;

        let mut messages_open = true;

        let outcome = loop {
            tokio::select! {
                msg = messages.recv(), if messages_open => {
                    match msg {
                        Some(event) => {
                            if let Some(outcome) = classify_message(&event, &config.host_origin) {
                                break outcome;
                            }
                        }
                        // Sender gone; keep polling.
                        None => messages_open = false,
                    }
                }
                _ = interval.tick() => {
                    if let Some(outcome) = poll_once(transport.as_ref(), &token).await {
                        break outcome;
                    }
                }
            }
        };

        if outcome == SigningOutcome::Signed {
            if let Err(err) = transport.complete(&token).await {
                tracing::debug!(%err, "completion notification failed; poll will reconcile");
            }
        }

        let _ = outcome_tx.send(outcome);
    });

    (CompletionWatch { task }, outcome_rx)
}

/// One fallback poll. Transport errors are swallowed; the next tick
/// retries.
async fn poll_once<T: SessionTransport + ?Sized>(
    transport: &T,
    token: &str,
) -> Option<SigningOutcome> {
    match transport.load(token).await {
        Ok(payload) => match payload.step {
            SessionStep::Completed => Some(SigningOutcome::Signed),
            SessionStep::Declined => Some(SigningOutcome::Declined),
            _ => None,
        },
        Err(err) => {
            tracing::debug!(%err, "completion poll failed; retrying next interval");
            None
        }
    }
}
