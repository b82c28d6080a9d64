//! Confirmed notes eligible to be reply parents.

use std::collections::HashMap;
use std::sync::Arc;

use crate::event::Note;

/// Append-only set of confirmed notes for one thread, in publish order.
///
/// Only notes accepted by at least one relay are inserted, so nothing ever
/// replies to a note the network never saw.
#[derive(Debug, Default)]
pub struct ThreadPool {
    notes: Vec<Arc<Note>>,
    index: HashMap<String, usize>,
}

impl ThreadPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a confirmed note. Re-inserting an id is a no-op.
    ///
    /// Returns `true` if the note was new.
    pub fn insert(&mut self, note: Arc<Note>) -> bool {
        if self.index.contains_key(note.id()) {
            return false;
        }
        self.index.insert(note.id().to_string(), self.notes.len());
        self.notes.push(note);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Note>> {
        self.index.get(id).map(|&i| &self.notes[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Most recently confirmed note.
    pub fn latest(&self) -> Option<&Arc<Note>> {
        self.notes.last()
    }

    /// Notes in confirmation order.
    pub fn notes(&self) -> &[Arc<Note>] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
