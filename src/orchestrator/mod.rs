//! Thread orchestration.
//!
//! Drives a whole run as a state machine:
//!
//! ```text
//! Connecting ─> Announcing ─> PublishingRoot ─> PublishingReplies ─┐
//!      │            (opt)           ▲                              │
//!      │                            └──────── next thread ─────────┤
//!      │                                                           ▼
//!      └──────────────── fatal error / cancel ──────────────> Draining
//!                                                                  │
//!                                             Done (teardown) <────┘
//! ```
//!
//! A reply is only built once its parent has been confirmed, and only
//! confirmed notes enter the [`ThreadPool`]. Per-note publish failures are
//! counted and the run moves on; signing and configuration errors end the
//! run. Teardown (`Done`) runs on every exit path, including cancellation.

mod content;
mod pacing;
mod summary;

pub use content::{participant_name, ContentGenerator};
pub use pacing::{Pacer, Timestamps};
pub use summary::{ConnectionFailure, RunSummary, ThreadReport};

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::{ConfigError, RunConfig};
use crate::event::{build_note, build_profile, Note, NoteDraft, ProfileMetadata};
use crate::identity::{Identity, SigningError};
use crate::publish::{PublishError, PublishReceipt, Publisher};
use crate::relay::{relay_for_url, RelayConnection};
use crate::threading::{resolve_tags, ThreadPool};
use crate::topology::{Author, TopologyGenerator};

/// Name of the identity that starts every thread.
pub const ROOT_NAME: &str = "Thread Starter";

/// Offset between the topology and content seeds.
const CONTENT_SEED_OFFSET: u64 = 0x9e37_79b9_7f4a_7c15;

// ============================================================================
// States and errors
// ============================================================================

/// Orchestrator lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Connecting,
    Announcing,
    PublishingRoot,
    PublishingReplies,
    Draining,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::Connecting => "connecting",
            RunState::Announcing => "announcing",
            RunState::PublishingRoot => "publishing_root",
            RunState::PublishingReplies => "publishing_replies",
            RunState::Draining => "draining",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors that end a run. Teardown has already happened when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Signing failed: {0}")]
    Signing(#[from] SigningError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Run cancelled")]
    Cancelled,
}

// ============================================================================
// Cancellation
// ============================================================================

/// Handle to stop a running orchestrator from another task.
#[derive(Clone)]
pub struct RunHandle {
    cancel: Arc<watch::Sender<bool>>,
}

impl RunHandle {
    /// Signal the run to stop. The run still tears down its connections.
    pub fn stop(&self) {
        let _ = self.cancel.send(true);
    }
}

#[derive(Clone)]
struct Cancellation {
    rx: watch::Receiver<bool>,
}

impl Cancellation {
    fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Run `fut` unless the run is stopped first.
    async fn guard<F: Future>(&self, fut: F) -> Result<F::Output, RunError> {
        if self.is_cancelled() {
            return Err(RunError::Cancelled);
        }
        let mut rx = self.rx.clone();
        tokio::select! {
            biased;
            out = fut => Ok(out),
            _ = async {
                let stopped = rx.wait_for(|stopped| *stopped).await.is_ok();
                // A dropped sender can never cancel.
                if !stopped {
                    futures::future::pending::<()>().await;
                }
            } => Err(RunError::Cancelled),
        }
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Sequences identities, topology, signing and publishing for one run.
pub struct ThreadOrchestrator {
    config: RunConfig,
    root: Identity,
    participants: Vec<Identity>,
    relays: Vec<Arc<dyn RelayConnection>>,
    connected: Vec<Arc<dyn RelayConnection>>,
    publisher: Publisher,
    topology: TopologyGenerator<StdRng>,
    content: ContentGenerator<StdRng>,
    pacer: Pacer,
    clock: Timestamps,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel: Cancellation,
    state: RunState,
    run_id: Uuid,
    summary: RunSummary,
}

impl ThreadOrchestrator {
    /// Assemble an orchestrator from explicit collaborators.
    pub fn new(
        config: RunConfig,
        root: Identity,
        participants: Vec<Identity>,
        relays: Vec<Arc<dyn RelayConnection>>,
    ) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let run_id = Uuid::new_v4();

        let publisher = Publisher::new(config.publish_timeout)
            .with_settle(config.settle)
            .with_retries(config.publish_retries);

        Self {
            topology: TopologyGenerator::new(config.strategy, StdRng::seed_from_u64(seed)),
            content: ContentGenerator::new(StdRng::seed_from_u64(seed ^ CONTENT_SEED_OFFSET)),
            pacer: Pacer::new(config.pacing),
            clock: Timestamps::new(),
            publisher,
            cancel_tx: Arc::new(cancel_tx),
            cancel: Cancellation { rx: cancel_rx },
            state: RunState::Idle,
            summary: RunSummary::new(run_id.to_string()),
            run_id,
            connected: Vec::new(),
            config,
            root,
            participants,
            relays,
        }
    }

    /// Build identities and relay connections from configuration.
    ///
    /// The root identity uses the configured key when present; every other
    /// key is freshly generated.
    pub fn from_config(config: RunConfig) -> Result<Self, RunError> {
        let mut rng = rand::rng();
        let root = match &config.root_secret_key {
            Some(key) => Identity::from_secret_bytes(ROOT_NAME, key.as_bytes())?,
            None => Identity::generate(ROOT_NAME, &mut rng),
        };
        let participants = (0..config.participants)
            .map(|i| Identity::generate(participant_name(i), &mut rng))
            .collect();
        let relays = config
            .relays
            .iter()
            .map(|url| {
                relay_for_url(url).map_err(|_| ConfigError::UnsupportedRelay(url.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::new(config, root, participants, relays))
    }

    /// Handle for stopping this run from another task.
    pub fn handle(&self) -> RunHandle {
        RunHandle {
            cancel: Arc::clone(&self.cancel_tx),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn root_identity(&self) -> &Identity {
        &self.root
    }

    pub fn participants(&self) -> &[Identity] {
        &self.participants
    }

    /// Results so far. Complete once [`run`](Self::run) returns.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Execute the run. Connections are always torn down before returning.
    pub async fn run(&mut self) -> Result<RunSummary, RunError> {
        let span = info_span!("run", run_id = %self.run_id);
        async {
            info!(
                relays = self.relays.len(),
                participants = self.participants.len(),
                threads = self.config.threads,
                replies = self.config.replies,
                strategy = %self.topology.strategy(),
                "Starting thread generation"
            );

            let outcome = self.execute().await;
            self.teardown().await;

            match outcome {
                Ok(()) => {
                    info!(
                        confirmed = self.summary.confirmed_notes,
                        failed = self.summary.failed_publishes(),
                        "Run finished"
                    );
                    Ok(self.summary.clone())
                }
                Err(e) => {
                    error!(error = %e, "Run aborted");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(&mut self) -> Result<(), RunError> {
        self.transition(RunState::Connecting);
        self.connect_all().await?;

        if self.config.publish_profiles {
            self.transition(RunState::Announcing);
            self.announce().await?;
        }

        for thread in 0..self.config.threads {
            self.transition(RunState::PublishingRoot);
            let Some(root) = self.publish_root(thread).await? else {
                continue;
            };
            self.transition(RunState::PublishingReplies);
            self.publish_replies(root).await?;
        }

        self.transition(RunState::Draining);
        self.cancel
            .guard(tokio::time::sleep(self.config.drain_grace))
            .await
    }

    fn transition(&mut self, next: RunState) {
        info!(from = %self.state, to = %next, "Run state changed");
        self.state = next;
    }

    /// Connect every relay concurrently. Failures are logged and skipped.
    async fn connect_all(&mut self) -> Result<(), RunError> {
        let timeout = self.config.connect_timeout;
        let attempts = futures::future::join_all(self.relays.iter().map(|relay| async move {
            let result = match tokio::time::timeout(timeout, relay.connect()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("no connection within {:?}", timeout)),
            };
            (Arc::clone(relay), result)
        }));
        let attempts = self.cancel.guard(attempts).await?;

        for (relay, result) in attempts {
            match result {
                Ok(()) => {
                    debug!(relay = %relay.url(), "Relay connected");
                    self.connected.push(relay);
                }
                Err(error) => {
                    warn!(relay = %relay.url(), error = %error, "Relay connection failed");
                    self.summary.connection_failures.push(ConnectionFailure {
                        relay: relay.url().to_string(),
                        error,
                    });
                }
            }
        }

        self.summary.connected_relays = self.connected.len();
        if self.connected.is_empty() {
            warn!("No relays connected; every publish will fail");
        }
        Ok(())
    }

    /// Publish a kind 0 profile for the root author and every participant.
    async fn announce(&mut self) -> Result<(), RunError> {
        let mut profiles = Vec::with_capacity(self.participants.len() + 1);
        for identity in std::iter::once(&self.root).chain(&self.participants) {
            let metadata = ProfileMetadata::for_participant(identity.name());
            profiles.push(build_profile(identity, &metadata, self.clock.next())?);
        }

        for profile in &profiles {
            if self.publish_note(profile).await?.is_ok() {
                self.summary.confirmed_profiles += 1;
            }
        }
        Ok(())
    }

    /// Publish the root of thread `thread`. `None` if no relay confirmed it.
    async fn publish_root(&mut self, thread: usize) -> Result<Option<Arc<Note>>, RunError> {
        let draft = NoteDraft::text(
            self.root.public_key(),
            self.content.root(thread),
            self.clock.next(),
        );
        let root = build_note(
            draft,
            resolve_tags(None, self.config.relay_hint.as_deref()),
            &self.root,
        )?;

        let slot = self.summary.threads.len();
        self.summary
            .threads
            .push(ThreadReport::new(root.id(), root.author_id()));

        match self.publish_note(&root).await? {
            Ok(receipt) => {
                self.summary.confirmed_notes += 1;
                self.summary.threads[slot].root_confirmed_by = receipt.confirmed_by;
                info!(thread = thread + 1, root_id = %root.id(), "Thread root confirmed");
                Ok(Some(Arc::new(root)))
            }
            Err(_) => {
                warn!(thread = thread + 1, root_id = %root.id(), "Thread root not confirmed; skipping its replies");
                Ok(None)
            }
        }
    }

    /// Publish the scheduled replies under `root`.
    async fn publish_replies(&mut self, root: Arc<Note>) -> Result<(), RunError> {
        let slot = self.summary.threads.len() - 1;
        let mut pool = ThreadPool::new();
        pool.insert(Arc::clone(&root));

        for reply_index in 0..self.config.replies {
            let parent = Arc::clone(self.topology.next_parent(&pool, &root));
            let author = self.topology.next_author(
                &parent,
                self.root.public_key(),
                self.participants.len(),
            );
            let tags = resolve_tags(Some(parent.as_ref()), self.config.relay_hint.as_deref());
            let content = self.content.reply();
            let created_at = self.clock.next();

            let identity = self.identity_for(author);
            let draft =
                NoteDraft::text(identity.public_key(), content, created_at).replying_to(parent.id());
            let reply = build_note(draft, tags, identity)?;

            debug!(
                reply = reply_index + 1,
                author = %identity.name(),
                parent_id = %parent.id(),
                "Publishing reply"
            );
            match self.publish_note(&reply).await? {
                Ok(_) => {
                    self.summary.confirmed_notes += 1;
                    self.summary.threads[slot].confirmed_replies += 1;
                    pool.insert(Arc::new(reply));
                }
                Err(_) => {
                    self.summary.threads[slot].failed_replies += 1;
                }
            }
        }
        Ok(())
    }

    fn identity_for(&self, author: Author) -> &Identity {
        match author {
            Author::Root => &self.root,
            Author::Participant(idx) => self.participants.get(idx).unwrap_or(&self.root),
        }
    }

    /// Pace, then publish one note to the connected relays.
    ///
    /// The outer `Result` is the run (cancellation); the inner one is this
    /// note's publish outcome, already logged and counted on failure.
    async fn publish_note(
        &mut self,
        note: &Note,
    ) -> Result<Result<PublishReceipt, PublishError>, RunError> {
        self.cancel.guard(self.pacer.wait()).await?;
        let result = self
            .cancel
            .guard(self.publisher.publish(note, &self.connected))
            .await?;

        match &result {
            Ok(receipt) => {
                debug!(
                    note_id = %note.id(),
                    kind = note.kind(),
                    confirmed_by = receipt.confirmed_by.len(),
                    "Note confirmed"
                );
            }
            Err(e) => {
                let reason = e.reason_key();
                warn!(note_id = %note.id(), kind = note.kind(), reason = %reason, error = %e, "Publish failed");
                self.summary.record_failure(reason);
            }
        }
        Ok(result)
    }

    /// Disconnect every configured relay and enter `Done`.
    async fn teardown(&mut self) {
        if self.cancel.is_cancelled() {
            info!("Run cancelled; tearing down");
        }
        let timeout = self.config.connect_timeout;
        let results = futures::future::join_all(self.relays.iter().map(|relay| async move {
            (
                relay.url().to_string(),
                tokio::time::timeout(timeout, relay.disconnect()).await,
            )
        }))
        .await;

        for (url, result) in results {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(relay = %url, error = %e, "Relay disconnect failed"),
                Err(_) => warn!(relay = %url, "Relay disconnect timed out"),
            }
        }
        self.connected.clear();
        self.transition(RunState::Done);
    }
}
