//! Signed Nostr events.
//!
//! This module contains:
//! - [`TagSet`] / [`Tag`]: NIP-10 reference tags
//! - [`NoteDraft`]: unsigned content, built just before signing
//! - [`Note`]: immutable signed event with a content-derived id
//! - [`build_note`] / [`build_profile`]: the event builder

mod profile;
mod tags;

pub use profile::ProfileMetadata;
pub use tags::{Marker, Tag, TagKind, TagSet};

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::identity::{verify_signature, Identity, SigningError};

/// Kind 0: user profile metadata.
pub const KIND_METADATA: u16 = 0;
/// Kind 1: short text note.
pub const KIND_TEXT_NOTE: u16 = 1;

/// Unsigned note content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    /// Hex public key of the author that will sign this draft.
    pub author_id: String,
    pub kind: u16,
    pub content: String,
    /// Unix seconds.
    pub created_at: u64,
    /// Id of the published note this one replies to, if any.
    pub parent_ref: Option<String>,
}

impl NoteDraft {
    /// Draft a kind 1 text note.
    pub fn text(author_id: impl Into<String>, content: impl Into<String>, created_at: u64) -> Self {
        Self {
            author_id: author_id.into(),
            kind: KIND_TEXT_NOTE,
            content: content.into(),
            created_at,
            parent_ref: None,
        }
    }

    /// Mark this draft as a reply to `parent_id`.
    pub fn replying_to(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_ref = Some(parent_id.into());
        self
    }
}

/// Signed, immutable event.
///
/// Serializes to the NIP-01 wire object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    id: String,
    pubkey: String,
    created_at: u64,
    kind: u16,
    tags: TagSet,
    content: String,
    sig: String,
}

impl Note {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn author_id(&self) -> &str {
        &self.pubkey
    }

    pub fn created_at(&self) -> u64 {
        self.created_at
    }

    pub fn kind(&self) -> u16 {
        self.kind
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn signature(&self) -> &str {
        &self.sig
    }

    /// True when the id matches the content it claims to hash.
    pub fn has_valid_id(&self) -> bool {
        event_digest(
            &self.pubkey,
            self.created_at,
            self.kind,
            &self.tags,
            &self.content,
        )
        .map(|digest| hex::encode(digest) == self.id)
        .unwrap_or(false)
    }

    /// True when the signature verifies against the author's key.
    pub fn has_valid_signature(&self) -> bool {
        let mut digest = [0u8; 32];
        match hex::decode_to_slice(&self.id, &mut digest) {
            Ok(()) => verify_signature(&self.pubkey, &digest, &self.sig),
            Err(_) => false,
        }
    }

    /// Wire JSON of this event.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// NIP-01 id: SHA-256 of `[0, pubkey, created_at, kind, tags, content]`.
pub fn event_digest(
    pubkey: &str,
    created_at: u64,
    kind: u16,
    tags: &TagSet,
    content: &str,
) -> Result<[u8; 32], serde_json::Error> {
    let canonical = serde_json::to_vec(&(0u8, pubkey, created_at, kind, tags, content))?;
    Ok(Sha256::digest(&canonical).into())
}

/// Sign a draft with its author's identity.
///
/// The draft's author must be the identity doing the signing; the active
/// signer is always this explicit argument. A draft marked as a reply must
/// carry tags whose parent reference is that note.
pub fn build_note(draft: NoteDraft, tags: TagSet, identity: &Identity) -> Result<Note, SigningError> {
    if draft.author_id != identity.public_key() {
        return Err(SigningError::Failed(format!(
            "draft author {} does not match signer {}",
            draft.author_id,
            identity.public_key()
        )));
    }
    if let Some(parent_id) = &draft.parent_ref {
        if tags.parent().map(|t| t.value.as_str()) != Some(parent_id.as_str()) {
            return Err(SigningError::ParentNotReferenced(parent_id.clone()));
        }
    }

    let digest = event_digest(
        &draft.author_id,
        draft.created_at,
        draft.kind,
        &tags,
        &draft.content,
    )
    .map_err(|e| SigningError::Failed(format!("canonical serialization: {}", e)))?;
    let sig = identity.sign(&digest)?;

    Ok(Note {
        id: hex::encode(digest),
        pubkey: draft.author_id,
        created_at: draft.created_at,
        kind: draft.kind,
        tags,
        content: draft.content,
        sig,
    })
}

/// Sign a kind 0 profile event for `identity`.
pub fn build_profile(
    identity: &Identity,
    metadata: &ProfileMetadata,
    created_at: u64,
) -> Result<Note, SigningError> {
    let content = serde_json::to_string(metadata)
        .map_err(|e| SigningError::Failed(format!("profile serialization: {}", e)))?;
    let draft = NoteDraft {
        author_id: identity.public_key().to_string(),
        kind: KIND_METADATA,
        content,
        created_at,
        parent_ref: None,
    };
    build_note(draft, TagSet::new(), identity)
}
