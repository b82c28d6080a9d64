//! NIP-10 reply linkage.
//!
//! [`resolve_tags`] computes the tag set for a new note given the note it
//! replies to. Every reply carries exactly one `root`-marked event reference
//! and one reference to its immediate parent; when the parent *is* the root,
//! both roles collapse into a single `root`-marked tag.
//!
//! Root resolution, in priority order:
//! 1. the parent's own `root`-marked event reference
//! 2. the parent's first unmarked event reference (legacy positional form)
//! 3. the parent itself
//!
//! Resolution never fails: a parent with malformed or missing references is
//! treated as a thread root.

mod pool;

pub use pool::ThreadPool;

use crate::event::{Marker, Note, Tag, TagSet};

/// Compute the tag set for a note replying to `parent`.
///
/// `None` yields an empty tag set: the new note starts a thread.
pub fn resolve_tags(parent: Option<&Note>, relay_hint: Option<&str>) -> TagSet {
    let Some(parent) = parent else {
        return TagSet::new();
    };

    let root_id = resolve_root_id(parent);
    let mut tags = TagSet::new();

    if root_id == parent.id() {
        tags.push(Tag::event(parent.id(), relay_hint, Some(Marker::Root)));
    } else {
        tags.push(Tag::event(root_id, relay_hint, Some(Marker::Root)));
        tags.push(Tag::event(parent.id(), relay_hint, Some(Marker::Reply)));
    }

    // Parent author first, then everyone the parent was addressed to.
    tags.push(Tag::pubkey(parent.author_id()));
    for key in parent.tags().pubkeys() {
        if !tags.contains_pubkey(&key.value) {
            tags.push(Tag::pubkey(key.value.clone()));
        }
    }

    tags
}

/// Id of the thread root that `parent` belongs to.
pub fn resolve_root_id(parent: &Note) -> &str {
    let tags = parent.tags();
    if let Some(root) = tags.root().filter(|t| !t.value.is_empty()) {
        return &root.value;
    }
    if let Some(first) = tags.events().find(|t| !t.value.is_empty()) {
        return &first.value;
    }
    parent.id()
}
