//! In-process relay for dry runs and tests.
//!
//! Behaves like a relay that checks event ids and signatures, then applies
//! a configured verdict. Useful for exercising partial acceptance, explicit
//! rejection and hung endpoints without a network.
//!
//! # URL form
//!
//! ```text
//! sim://accept
//! sim://reject?reason=blocked:%20no%20thanks
//! sim://hang
//! sim://lossy?rate=0.7&seed=3
//! sim://down
//! ```
//!
//! Anything after a `/` in the behavior name is ignored, so several
//! relays of the same kind can be told apart (`sim://accept/1`).

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::RwLock;
use tracing::debug;

use super::{RelayAck, RelayConnection, RelayError, Result, SIMULATED_SCHEME};
use crate::event::Note;

/// Default message for `sim://reject`.
pub const DEFAULT_REJECT_REASON: &str = "blocked: simulated rejection";
/// Message returned when a lossy relay drops an event.
pub const LOSSY_REJECT_REASON: &str = "rate-limited: simulated loss";

/// Verdict a simulated relay applies to well-formed events.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayBehavior {
    /// Accept everything.
    Accept,
    /// Reject everything with the given message.
    Reject(String),
    /// Never answer.
    Hang,
    /// Accept with probability `accept_rate`, seeded.
    Lossy { accept_rate: f64, seed: u64 },
    /// Refuse connections.
    Unreachable,
}

/// Simulated relay endpoint.
pub struct SimulatedRelay {
    url: String,
    behavior: RelayBehavior,
    latency: Duration,
    connected: AtomicBool,
    accepted: RwLock<Vec<Note>>,
    seen: Mutex<HashSet<String>>,
    rejected: AtomicU64,
    rng: Mutex<StdRng>,
}

impl SimulatedRelay {
    pub fn new(url: impl Into<String>, behavior: RelayBehavior) -> Self {
        let seed = match &behavior {
            RelayBehavior::Lossy { seed, .. } => *seed,
            _ => 0,
        };
        Self {
            url: url.into(),
            behavior,
            latency: Duration::ZERO,
            connected: AtomicBool::new(false),
            accepted: RwLock::new(Vec::new()),
            seen: Mutex::new(HashSet::new()),
            rejected: AtomicU64::new(0),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Delay every answer by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Parse a `sim://` URL into a relay.
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix(SIMULATED_SCHEME)
            .ok_or_else(|| RelayError::UnsupportedUrl(url.to_string()))?;
        let (name, query) = rest.split_once('?').unwrap_or((rest, ""));
        let name = name.split('/').next().unwrap_or_default();

        let param = |key: &str| {
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.replace("%20", " "))
        };

        let behavior = match name {
            "accept" => RelayBehavior::Accept,
            "reject" => RelayBehavior::Reject(
                param("reason").unwrap_or_else(|| DEFAULT_REJECT_REASON.to_string()),
            ),
            "hang" => RelayBehavior::Hang,
            "lossy" => RelayBehavior::Lossy {
                accept_rate: param("rate")
                    .and_then(|r| r.parse::<f64>().ok())
                    .unwrap_or(0.5)
                    .clamp(0.0, 1.0),
                seed: param("seed").and_then(|s| s.parse().ok()).unwrap_or(0),
            },
            "down" => RelayBehavior::Unreachable,
            _ => return Err(RelayError::UnsupportedUrl(url.to_string())),
        };

        let mut relay = Self::new(url, behavior);
        if let Some(ms) = param("latency_ms").and_then(|v| v.parse().ok()) {
            relay.latency = Duration::from_millis(ms);
        }
        Ok(relay)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Events this relay stored, in arrival order.
    pub async fn accepted(&self) -> Vec<Note> {
        self.accepted.read().await.clone()
    }

    pub async fn accepted_count(&self) -> usize {
        self.accepted.read().await.len()
    }

    pub fn rejected_count(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    fn reject(&self, message: impl Into<String>) -> RelayAck {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        RelayAck::Rejected(message.into())
    }

    fn lossy_accepts(&self, rate: f64) -> bool {
        match self.rng.lock() {
            Ok(mut rng) => rng.random_bool(rate),
            Err(_) => false,
        }
    }

    /// Store the note unless already held. Returns `false` on duplicates.
    async fn store(&self, note: &Note) -> bool {
        let fresh = match self.seen.lock() {
            Ok(mut seen) => seen.insert(note.id().to_string()),
            Err(_) => true,
        };
        if fresh {
            self.accepted.write().await.push(note.clone());
        }
        fresh
    }
}

#[async_trait]
impl RelayConnection for SimulatedRelay {
    fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<()> {
        if self.behavior == RelayBehavior::Unreachable {
            return Err(RelayError::Connection(format!(
                "{}: simulated relay is down",
                self.url
            )));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn send_event(&self, note: &Note) -> Result<RelayAck> {
        if !self.is_connected() {
            return Err(RelayError::NotConnected(self.url.clone()));
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if !note.has_valid_id() {
            return Ok(self.reject("invalid: event id does not match"));
        }
        if !note.has_valid_signature() {
            return Ok(self.reject("invalid: bad signature"));
        }

        let ack = match &self.behavior {
            RelayBehavior::Accept => {
                if !self.store(note).await {
                    debug!(relay = %self.url, note_id = %note.id(), "duplicate: already have this event");
                }
                RelayAck::Accepted
            }
            RelayBehavior::Reject(message) => self.reject(message.clone()),
            RelayBehavior::Hang => futures::future::pending().await,
            RelayBehavior::Lossy { accept_rate, .. } => {
                if self.lossy_accepts(*accept_rate) {
                    self.store(note).await;
                    RelayAck::Accepted
                } else {
                    self.reject(LOSSY_REJECT_REASON)
                }
            }
            RelayBehavior::Unreachable => {
                return Err(RelayError::NotConnected(self.url.clone()));
            }
        };
        Ok(ack)
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}
