//! Run-end summary.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use crate::encoding::IdentifierEncoder;

/// A relay that could not be connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionFailure {
    pub relay: String,
    pub error: String,
}

/// Outcome of one generated thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadReport {
    /// Hex id of the thread root.
    pub root_id: String,
    /// Hex public key of the root author.
    pub root_author: String,
    /// Relays that confirmed the root. Empty if the root was never accepted.
    pub root_confirmed_by: BTreeSet<String>,
    pub confirmed_replies: usize,
    pub failed_replies: usize,
}

impl ThreadReport {
    pub fn new(root_id: impl Into<String>, root_author: impl Into<String>) -> Self {
        Self {
            root_id: root_id.into(),
            root_author: root_author.into(),
            root_confirmed_by: BTreeSet::new(),
            confirmed_replies: 0,
            failed_replies: 0,
        }
    }

    pub fn root_confirmed(&self) -> bool {
        !self.root_confirmed_by.is_empty()
    }
}

/// Counts and identifiers reported at the end of a run.
///
/// Kept current while the run progresses so a cancelled or failed run can
/// still report what it published.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    /// Text notes (roots and replies) confirmed by at least one relay.
    pub confirmed_notes: usize,
    /// Kind 0 profiles confirmed by at least one relay.
    pub confirmed_profiles: usize,
    /// Failed publishes per classified reason.
    pub failures: BTreeMap<String, usize>,
    pub connected_relays: usize,
    pub connection_failures: Vec<ConnectionFailure>,
    pub threads: Vec<ThreadReport>,
}

impl RunSummary {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            ..Self::default()
        }
    }

    pub fn record_failure(&mut self, reason_key: impl Into<String>) {
        *self.failures.entry(reason_key.into()).or_default() += 1;
    }

    pub fn failed_publishes(&self) -> usize {
        self.failures.values().sum()
    }

    /// Human-readable report with NIP-19 identifiers for external lookup.
    pub fn render(&self, encoder: &dyn IdentifierEncoder) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Run {}", self.run_id);
        let _ = writeln!(
            out,
            "  relays connected: {} ({} failed)",
            self.connected_relays,
            self.connection_failures.len()
        );
        for failure in &self.connection_failures {
            let _ = writeln!(out, "    {}: {}", failure.relay, failure.error);
        }
        let _ = writeln!(out, "  confirmed notes: {}", self.confirmed_notes);
        if self.confirmed_profiles > 0 {
            let _ = writeln!(out, "  confirmed profiles: {}", self.confirmed_profiles);
        }
        let _ = writeln!(out, "  failed publishes: {}", self.failed_publishes());
        for (reason, count) in &self.failures {
            let _ = writeln!(out, "    {}: {}", reason, count);
        }

        for (idx, thread) in self.threads.iter().enumerate() {
            let _ = writeln!(out, "  thread #{}", idx + 1);
            let _ = writeln!(out, "    root: {}", encoder.encode_note_id(&thread.root_id));
            let _ = writeln!(out, "    root id: {}", thread.root_id);
            let _ = writeln!(out, "    author: {}", encoder.encode_public_key(&thread.root_author));
            if thread.root_confirmed() {
                let relays: Vec<&str> = thread.root_confirmed_by.iter().map(String::as_str).collect();
                let _ = writeln!(out, "    root seen on: {}", relays.join(", "));
            } else {
                let _ = writeln!(out, "    root not confirmed by any relay");
            }
            let _ = writeln!(
                out,
                "    replies: {} confirmed, {} failed",
                thread.confirmed_replies, thread.failed_replies
            );
        }
        out
    }
}
