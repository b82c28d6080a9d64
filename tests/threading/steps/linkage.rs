//! Reply linkage step definitions.

use std::collections::HashMap;

use cucumber::{given, then, when, World};
use rand::rngs::StdRng;
use rand::SeedableRng;

use nostr_threadgen::event::{build_note, Marker, Note, NoteDraft, Tag, TagSet};
use nostr_threadgen::identity::Identity;
use nostr_threadgen::threading::resolve_tags;

/// Test context for reply linkage scenarios.
#[derive(Debug, World)]
#[world(init = Self::new)]
pub struct LinkageWorld {
    rng: StdRng,
    clock: u64,
    authors: HashMap<String, Identity>,
    /// Published notes by scenario label.
    notes: HashMap<String, Note>,
    /// Ids referenced but never published (legacy upstream data).
    external_ids: HashMap<String, String>,
    chain: Vec<Note>,
}

impl LinkageWorld {
    fn new() -> Self {
        Self {
            rng: StdRng::seed_from_u64(10),
            clock: 1_700_000_000,
            authors: HashMap::new(),
            notes: HashMap::new(),
            external_ids: HashMap::new(),
            chain: Vec::new(),
        }
    }

    fn author(&self, name: &str) -> &Identity {
        self.authors
            .get(name)
            .unwrap_or_else(|| panic!("unknown author {}", name))
    }

    fn note(&self, label: &str) -> &Note {
        self.notes
            .get(label)
            .unwrap_or_else(|| panic!("unknown note {}", label))
    }

    /// Id for a label: a published note or an external reference.
    fn id_of(&self, label: &str) -> String {
        match self.notes.get(label) {
            Some(note) => note.id().to_string(),
            None => self
                .external_ids
                .get(label)
                .unwrap_or_else(|| panic!("unknown label {}", label))
                .clone(),
        }
    }

    fn sign(&mut self, author: &str, content: &str, tags: TagSet) -> Note {
        self.clock += 1;
        let identity = self.author(author);
        let draft = NoteDraft::text(identity.public_key(), content, self.clock);
        build_note(draft, tags, identity).expect("signing failed")
    }

    fn reply_to(&mut self, author: &str, parent: &Note) -> Note {
        let tags = resolve_tags(Some(parent), Some("wss://relay.example"));
        self.sign(author, "reply", tags)
    }
}

// ==========================================================================
// Given Steps
// ==========================================================================

#[given(expr = "an author {string}")]
fn given_author(world: &mut LinkageWorld, name: String) {
    let identity = Identity::generate(name.clone(), &mut world.rng);
    world.authors.insert(name, identity);
}

#[given(expr = "{string} posts {string}")]
#[when(expr = "{string} posts {string}")]
fn author_posts(world: &mut LinkageWorld, author: String, label: String) {
    let note = world.sign(&author, "a new thread", resolve_tags(None, None));
    world.notes.insert(label, note);
}

#[given(expr = "{string} replies {string} to {string}")]
#[when(expr = "{string} replies {string} to {string}")]
fn author_replies(world: &mut LinkageWorld, author: String, label: String, parent: String) {
    let parent = world.note(&parent).clone();
    let note = world.reply_to(&author, &parent);
    world.notes.insert(label, note);
}

#[given(expr = "{string} posted {string} referencing {string} without markers")]
fn legacy_note(world: &mut LinkageWorld, author: String, label: String, origin: String) {
    let origin_id = hex::encode([0xabu8; 32]);
    world.external_ids.insert(origin.clone(), origin_id.clone());

    let tags: TagSet = [Tag::event(origin_id, None, None)].into_iter().collect();
    let note = world.sign(&author, "positional reply", tags);
    world.notes.insert(label, note);
}

#[given(expr = "{string} posted {string} with an empty root reference")]
fn malformed_note(world: &mut LinkageWorld, author: String, label: String) {
    let tags: TagSet = [Tag::event("", None, Some(Marker::Root))]
        .into_iter()
        .collect();
    let note = world.sign(&author, "malformed", tags);
    world.notes.insert(label, note);
}

// ==========================================================================
// When Steps
// ==========================================================================

#[when(expr = "a chain of {int} replies is built under {string}")]
fn build_chain(world: &mut LinkageWorld, depth: usize, root: String) {
    let mut parent = world.note(&root).clone();
    let authors = ["alice", "bob"];
    for i in 0..depth {
        let reply = world.reply_to(authors[i % 2], &parent);
        world.chain.push(reply.clone());
        parent = reply;
    }
}

// ==========================================================================
// Then Steps
// ==========================================================================

#[then(expr = "{string} has no tags")]
fn has_no_tags(world: &mut LinkageWorld, label: String) {
    assert!(world.note(&label).tags().is_empty());
}

#[then(expr = "{string} has {int} root tag(s) referencing {string}")]
fn has_root_tags(world: &mut LinkageWorld, label: String, count: usize, target: String) {
    let expected = world.id_of(&target);
    let roots: Vec<&Tag> = world
        .note(&label)
        .tags()
        .events()
        .filter(|t| t.marker == Some(Marker::Root))
        .collect();
    assert_eq!(roots.len(), count, "root tags on {}", label);
    assert!(roots.iter().all(|t| t.value == expected));
}

#[then(expr = "{string} has {int} reply tag(s)")]
fn has_reply_tag_count(world: &mut LinkageWorld, label: String, count: usize) {
    let replies = world
        .note(&label)
        .tags()
        .events()
        .filter(|t| t.marker == Some(Marker::Reply))
        .count();
    assert_eq!(replies, count, "reply tags on {}", label);
}

#[then(expr = "{string} has {int} reply tag(s) referencing {string}")]
fn has_reply_tags(world: &mut LinkageWorld, label: String, count: usize, target: String) {
    let expected = world.id_of(&target);
    let replies: Vec<&Tag> = world
        .note(&label)
        .tags()
        .events()
        .filter(|t| t.marker == Some(Marker::Reply))
        .collect();
    assert_eq!(replies.len(), count, "reply tags on {}", label);
    assert!(replies.iter().all(|t| t.value == expected));
}

#[then(expr = "{string} mentions the author of {string}")]
fn mentions_author(world: &mut LinkageWorld, label: String, target: String) {
    let author = world.note(&target).author_id().to_string();
    assert!(world.note(&label).tags().contains_pubkey(&author));
}

#[then(expr = "every note in the chain has root {string}")]
fn chain_has_root(world: &mut LinkageWorld, root: String) {
    let expected = world.id_of(&root);
    assert!(!world.chain.is_empty());
    for (depth, note) in world.chain.iter().enumerate() {
        let root_tag = note.tags().root().expect("missing root tag");
        assert_eq!(root_tag.value, expected, "depth {}", depth + 1);
    }
}
