//! Publish-and-confirm against a set of relays.
//!
//! A publish attempt fans a signed note out to every relay concurrently and
//! resolves against one deadline:
//!
//! ```text
//!            ┌─> relay A ── OK true ───┐
//! note ──────┼─> relay B ── OK false ──┼──> PublishReceipt { confirmed_by: {A} }
//!            └─> relay C ── (silent) ──┘        or PublishError::{Timeout, Rejected}
//! ```
//!
//! Sends still in flight when the attempt resolves are dropped, which
//! cancels them. Partial acceptance is the normal case; the receipt names
//! exactly the relays that confirmed.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Deserialize;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

use crate::event::Note;
use crate::relay::{RelayAck, RelayConnection};
use crate::utils::retry::{is_retryable, publish_backoff};

/// Default bound on one publish attempt.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);

/// NIP-01 machine-readable rejection prefixes.
const KNOWN_PREFIXES: &[&str] = &[
    "duplicate",
    "pow",
    "blocked",
    "rate-limited",
    "invalid",
    "restricted",
    "error",
];

// ============================================================================
// Outcomes
// ============================================================================

/// When a publish attempt stops waiting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettlePolicy {
    /// Resolve on the first confirming relay and cancel the rest.
    #[default]
    FirstConfirmation,
    /// Wait for every relay to answer, or the deadline.
    AllSettled,
}

/// Why a relay did not confirm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeReason {
    /// Relay answered `OK false` with this message.
    Rejected(String),
    /// Transport error talking to the relay.
    Failed(String),
    /// No answer before the deadline.
    TimedOut,
    /// Still pending when another relay confirmed.
    Cancelled,
}

impl OutcomeReason {
    /// Counter key for this reason.
    pub fn key(&self) -> String {
        match self {
            OutcomeReason::Rejected(message) => {
                format!("rejected:{}", classify_rejection(message))
            }
            OutcomeReason::Failed(_) => "rejected:connection".to_string(),
            OutcomeReason::TimedOut => "timeout".to_string(),
            OutcomeReason::Cancelled => "cancelled".to_string(),
        }
    }
}

impl fmt::Display for OutcomeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeReason::Rejected(message) => write!(f, "rejected: {}", message),
            OutcomeReason::Failed(error) => write!(f, "failed: {}", error),
            OutcomeReason::TimedOut => write!(f, "timed out"),
            OutcomeReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// One relay's result for one publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayOutcome {
    pub relay: String,
    pub accepted: bool,
    pub reason: Option<OutcomeReason>,
}

impl RelayOutcome {
    fn accepted(relay: &str) -> Self {
        Self {
            relay: relay.to_string(),
            accepted: true,
            reason: None,
        }
    }

    fn failed(relay: &str, reason: OutcomeReason) -> Self {
        Self {
            relay: relay.to_string(),
            accepted: false,
            reason: Some(reason),
        }
    }
}

/// Successful publish: at least one relay confirmed.
#[derive(Debug, Clone)]
pub struct PublishReceipt {
    pub note_id: String,
    /// Exactly the relays that confirmed.
    pub confirmed_by: BTreeSet<String>,
    /// Every relay's outcome, in relay order.
    pub outcomes: Vec<RelayOutcome>,
}

/// Result type for publish operations.
pub type Result<T> = std::result::Result<T, PublishError>;

/// A publish attempt with zero confirmations.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publish of {note_id} timed out after {timeout:?} with no confirmation")]
    Timeout {
        note_id: String,
        timeout: Duration,
        outcomes: Vec<RelayOutcome>,
    },

    #[error("Publish of {note_id} confirmed by none of {} relays", .outcomes.len())]
    Rejected {
        note_id: String,
        outcomes: Vec<RelayOutcome>,
    },
}

impl PublishError {
    pub fn outcomes(&self) -> &[RelayOutcome] {
        match self {
            PublishError::Timeout { outcomes, .. } | PublishError::Rejected { outcomes, .. } => {
                outcomes
            }
        }
    }

    /// Counter key used in run summaries.
    ///
    /// Timeouts count as `timeout`. Rejections take the first relay
    /// rejection message's class, else `rejected:connection` when every
    /// relay failed at the transport, else `rejected:no-relays`.
    pub fn reason_key(&self) -> String {
        match self {
            PublishError::Timeout { .. } => "timeout".to_string(),
            PublishError::Rejected { outcomes, .. } => {
                let first_rejection = outcomes.iter().find_map(|o| match &o.reason {
                    Some(reason @ OutcomeReason::Rejected(_)) => Some(reason.key()),
                    _ => None,
                });
                match first_rejection {
                    Some(key) => key,
                    None if outcomes.is_empty() => "rejected:no-relays".to_string(),
                    None => "rejected:connection".to_string(),
                }
            }
        }
    }
}

/// Classify a relay's `OK false` message by its NIP-01 prefix.
///
/// Unknown or missing prefixes classify as `other`.
pub fn classify_rejection(message: &str) -> &'static str {
    let prefix = message
        .split_once(':')
        .map(|(prefix, _)| prefix.trim())
        .unwrap_or_default();
    KNOWN_PREFIXES
        .iter()
        .find(|known| prefix.eq_ignore_ascii_case(known))
        .copied()
        .unwrap_or("other")
}

// ============================================================================
// Fan-out
// ============================================================================

/// Publish `note` to every relay and wait for confirmations.
///
/// One deadline bounds the whole attempt. With
/// [`SettlePolicy::FirstConfirmation`] the attempt resolves on the first
/// `OK true`; outcomes already available are kept and the remaining sends
/// are cancelled.
pub async fn publish(
    note: &Note,
    relays: &[Arc<dyn RelayConnection>],
    timeout: Duration,
    settle: SettlePolicy,
) -> Result<PublishReceipt> {
    let deadline = Instant::now() + timeout;
    let mut slots: Vec<Option<RelayOutcome>> = vec![None; relays.len()];
    let mut confirmed_by = BTreeSet::new();
    let mut timed_out = false;

    let mut pending: FuturesUnordered<_> = relays
        .iter()
        .enumerate()
        .map(|(idx, relay)| async move { (idx, relay.send_event(note).await) })
        .collect();

    let mut record = |idx: usize, result: crate::relay::Result<RelayAck>| {
        let url = relays[idx].url();
        let outcome = match result {
            Ok(RelayAck::Accepted) => {
                confirmed_by.insert(url.to_string());
                RelayOutcome::accepted(url)
            }
            Ok(RelayAck::Rejected(message)) => {
                RelayOutcome::failed(url, OutcomeReason::Rejected(message))
            }
            Err(e) => RelayOutcome::failed(url, OutcomeReason::Failed(e.to_string())),
        };
        debug!(relay = %url, note_id = %note.id(), accepted = outcome.accepted, "Relay answered");
        slots[idx] = Some(outcome);
    };

    loop {
        match timeout_at(deadline, pending.next()).await {
            Ok(Some((idx, result))) => {
                let accepted = matches!(result, Ok(RelayAck::Accepted));
                record(idx, result);
                if accepted && settle == SettlePolicy::FirstConfirmation {
                    while let Some(Some((idx, result))) = pending.next().now_or_never() {
                        record(idx, result);
                    }
                    break;
                }
            }
            Ok(None) => break,
            Err(_) => {
                timed_out = true;
                break;
            }
        }
    }
    drop(pending);

    let outcomes: Vec<RelayOutcome> = slots
        .into_iter()
        .zip(relays)
        .map(|(slot, relay)| {
            slot.unwrap_or_else(|| {
                let reason = if timed_out {
                    OutcomeReason::TimedOut
                } else {
                    OutcomeReason::Cancelled
                };
                RelayOutcome::failed(relay.url(), reason)
            })
        })
        .collect();

    let note_id = note.id().to_string();
    if !confirmed_by.is_empty() {
        Ok(PublishReceipt {
            note_id,
            confirmed_by,
            outcomes,
        })
    } else if timed_out {
        Err(PublishError::Timeout {
            note_id,
            timeout,
            outcomes,
        })
    } else {
        Err(PublishError::Rejected { note_id, outcomes })
    }
}

/// Publish settings shared by every note in a run.
#[derive(Debug, Clone)]
pub struct Publisher {
    timeout: Duration,
    settle: SettlePolicy,
    retries: usize,
}

impl Default for Publisher {
    fn default() -> Self {
        Self::new(DEFAULT_PUBLISH_TIMEOUT)
    }
}

impl Publisher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            settle: SettlePolicy::default(),
            retries: 0,
        }
    }

    pub fn with_settle(mut self, settle: SettlePolicy) -> Self {
        self.settle = settle;
        self
    }

    /// Re-attempt retryable failures up to `retries` times with backoff.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    /// Publish one note. Without retries this is a single attempt.
    pub async fn publish(
        &self,
        note: &Note,
        relays: &[Arc<dyn RelayConnection>],
    ) -> Result<PublishReceipt> {
        if self.retries == 0 {
            return publish(note, relays, self.timeout, self.settle).await;
        }

        (|| publish(note, relays, self.timeout, self.settle))
            .retry(publish_backoff(self.retries))
            .when(is_retryable)
            .notify(|err: &PublishError, dur: Duration| {
                warn!(
                    note_id = %note.id(),
                    reason = %err.reason_key(),
                    delay = ?dur,
                    "Publish failed, retrying"
                );
            })
            .await
    }
}

#[cfg(test)]
mod tests;
