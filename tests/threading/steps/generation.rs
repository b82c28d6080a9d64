//! Thread generation step definitions.

use std::sync::Arc;

use cucumber::{given, then, when, World};
use rand::rngs::StdRng;
use rand::SeedableRng;

use nostr_threadgen::config::Config;
use nostr_threadgen::event::Note;
use nostr_threadgen::identity::Identity;
use nostr_threadgen::orchestrator::{participant_name, RunSummary, ThreadOrchestrator};
use nostr_threadgen::relay::{RelayConnection, SimulatedRelay};
use nostr_threadgen::topology::StrategyKind;

/// Test context for thread generation scenarios.
#[derive(World)]
#[world(init = Self::new)]
pub struct GenerationWorld {
    config: Config,
    relays: Vec<Arc<SimulatedRelay>>,
    root_key: String,
    participant_keys: Vec<String>,
    summary: Option<RunSummary>,
    /// Text notes stored by the first relay that accepted anything.
    published: Vec<Note>,
}

impl std::fmt::Debug for GenerationWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationWorld")
            .field("config", &self.config)
            .field("relays", &format!("[{} relays]", self.relays.len()))
            .field("summary", &self.summary)
            .field("published", &format!("[{} notes]", self.published.len()))
            .finish()
    }
}

impl GenerationWorld {
    fn new() -> Self {
        Self {
            config: Config {
                pacing_ms: 0,
                drain_grace_ms: 0,
                publish_timeout_ms: 150,
                connect_timeout_ms: 150,
                publish_profiles: false,
                seed: Some(31),
                ..Config::default()
            },
            relays: Vec::new(),
            root_key: String::new(),
            participant_keys: Vec::new(),
            summary: None,
            published: Vec::new(),
        }
    }

    fn summary(&self) -> &RunSummary {
        self.summary.as_ref().expect("no thread generated yet")
    }

    fn replies(&self) -> &[Note] {
        self.published.get(1..).unwrap_or_default()
    }
}

// ==========================================================================
// Given Steps
// ==========================================================================

#[given(expr = "relays {string}")]
fn given_relays(world: &mut GenerationWorld, urls: String) {
    world.config.relays = urls.split(',').map(|u| u.trim().to_string()).collect();
    world.relays = world
        .config
        .relays
        .iter()
        .map(|url| Arc::new(SimulatedRelay::from_url(url).expect("bad simulated url")))
        .collect();
}

#[given(expr = "the {string} strategy with {int} participant(s)")]
fn given_strategy(world: &mut GenerationWorld, strategy: String, participants: usize) {
    world.config.strategy = match strategy.as_str() {
        "flat" => StrategyKind::Flat,
        "linear" => StrategyKind::Linear,
        "branch" => StrategyKind::Branch,
        "alternating" => StrategyKind::Alternating,
        other => panic!("unknown strategy {}", other),
    };
    world.config.participants = participants;
}

// ==========================================================================
// When Steps
// ==========================================================================

#[when(expr = "a thread with {int} replies is generated")]
async fn generate_thread(world: &mut GenerationWorld, replies: usize) {
    world.config.replies = replies;
    let run = world.config.resolve().expect("invalid config");

    let mut rng = StdRng::seed_from_u64(5);
    let root = Identity::generate("Root", &mut rng);
    let participants: Vec<Identity> = (0..run.participants)
        .map(|i| Identity::generate(participant_name(i), &mut rng))
        .collect();
    world.root_key = root.public_key().to_string();
    world.participant_keys = participants
        .iter()
        .map(|p| p.public_key().to_string())
        .collect();

    let relays = world
        .relays
        .iter()
        .map(|r| Arc::clone(r) as Arc<dyn RelayConnection>)
        .collect();
    let mut orchestrator = ThreadOrchestrator::new(run, root, participants, relays);
    world.summary = Some(orchestrator.run().await.expect("run failed"));

    for relay in &world.relays {
        let accepted = relay.accepted().await;
        if !accepted.is_empty() {
            world.published = accepted;
            break;
        }
    }
}

// ==========================================================================
// Then Steps
// ==========================================================================

#[then(expr = "{int} notes are published")]
fn notes_published(world: &mut GenerationWorld, count: usize) {
    assert_eq!(world.summary().confirmed_notes, count);
    assert_eq!(world.published.len(), count);
}

#[then("each reply's parent is the previous note")]
fn parent_is_previous(world: &mut GenerationWorld) {
    for (i, reply) in world.replies().iter().enumerate() {
        let parent = reply.tags().parent().expect("reply without parent");
        assert_eq!(parent.value, world.published[i].id(), "reply {}", i + 1);
    }
}

#[then("each reply's root is the first note")]
fn root_is_first(world: &mut GenerationWorld) {
    let root_id = world.published[0].id();
    for reply in world.replies() {
        assert_eq!(reply.tags().root().expect("missing root").value, root_id);
    }
}

#[then("every reply answers the first note directly")]
fn answers_root_directly(world: &mut GenerationWorld) {
    let root_id = world.published[0].id();
    for reply in world.replies() {
        let events: Vec<_> = reply.tags().events().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value, root_id);
    }
}

#[then("authors alternate starting with the first participant")]
fn authors_alternate(world: &mut GenerationWorld) {
    for (i, reply) in world.replies().iter().enumerate() {
        let expected = if i % 2 == 0 {
            world.participant_keys[0].as_str()
        } else {
            world.root_key.as_str()
        };
        assert_eq!(reply.author_id(), expected, "reply {}", i + 1);
    }
}

#[then(expr = "the root was confirmed by {int} relay(s)")]
fn root_confirmed_by(world: &mut GenerationWorld, count: usize) {
    assert_eq!(world.summary().threads[0].root_confirmed_by.len(), count);
}

#[then(expr = "{int} publish(es) failed with reason {string}")]
fn publishes_failed(world: &mut GenerationWorld, count: usize, reason: String) {
    assert_eq!(world.summary().failures.get(&reason), Some(&count));
    assert_eq!(world.summary().failed_publishes(), count);
}
