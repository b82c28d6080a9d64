//! NIP-10 tag model.

use serde::ser::{Serialize, SerializeSeq, Serializer};

/// What a tag references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    /// `e` tag: reference to another event.
    Event,
    /// `p` tag: reference to an author.
    Pubkey,
}

impl TagKind {
    /// Single-letter tag name used on the wire.
    pub fn letter(&self) -> &'static str {
        match self {
            TagKind::Event => "e",
            TagKind::Pubkey => "p",
        }
    }
}

/// Role of an event reference within a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    Root,
    Reply,
}

impl Marker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Marker::Root => "root",
            Marker::Reply => "reply",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "root" => Some(Marker::Root),
            "reply" => Some(Marker::Reply),
            _ => None,
        }
    }
}

/// One `(kind, value, relay_hint, marker)` tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub kind: TagKind,
    pub value: String,
    pub relay_hint: Option<String>,
    pub marker: Option<Marker>,
}

impl Tag {
    /// Event reference, optionally hinted and marked.
    pub fn event(id: impl Into<String>, relay_hint: Option<&str>, marker: Option<Marker>) -> Self {
        Self {
            kind: TagKind::Event,
            value: id.into(),
            relay_hint: relay_hint.map(str::to_string),
            marker,
        }
    }

    /// Author reference.
    pub fn pubkey(key: impl Into<String>) -> Self {
        Self {
            kind: TagKind::Pubkey,
            value: key.into(),
            relay_hint: None,
            marker: None,
        }
    }

    pub fn is_event(&self) -> bool {
        self.kind == TagKind::Event
    }

    /// Wire form, e.g. `["e", <id>, <relay>, "root"]`.
    ///
    /// The relay slot is emitted (possibly empty) whenever a marker follows it.
    pub fn to_array(&self) -> Vec<String> {
        let mut fields = vec![self.kind.letter().to_string(), self.value.clone()];
        match (&self.relay_hint, self.marker) {
            (hint, Some(marker)) => {
                fields.push(hint.clone().unwrap_or_default());
                fields.push(marker.as_str().to_string());
            }
            (Some(hint), None) => fields.push(hint.clone()),
            (None, None) => {}
        }
        fields
    }

    /// Parse a wire tag. Tags of other kinds yield `None`.
    pub fn from_array(fields: &[String]) -> Option<Self> {
        let kind = match fields.first().map(String::as_str) {
            Some("e") => TagKind::Event,
            Some("p") => TagKind::Pubkey,
            _ => return None,
        };
        let value = fields.get(1)?.clone();
        let relay_hint = fields.get(2).filter(|h| !h.is_empty()).cloned();
        let marker = fields.get(3).and_then(|m| Marker::parse(m));

        Some(Self {
            kind,
            value,
            relay_hint,
            marker,
        })
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = self.to_array();
        let mut seq = serializer.serialize_seq(Some(fields.len()))?;
        for field in &fields {
            seq.serialize_element(field)?;
        }
        seq.end()
    }
}

/// Ordered tags of a note.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct TagSet(Vec<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, tag: Tag) {
        self.0.push(tag);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Event-reference tags in order.
    pub fn events(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter().filter(|t| t.kind == TagKind::Event)
    }

    /// Author-reference tags in order.
    pub fn pubkeys(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter().filter(|t| t.kind == TagKind::Pubkey)
    }

    /// First event reference marked `root`.
    pub fn root(&self) -> Option<&Tag> {
        self.events().find(|t| t.marker == Some(Marker::Root))
    }

    /// Event reference to the immediate parent.
    ///
    /// A `reply` marker wins; otherwise a lone `root` tag is the parent of a
    /// direct reply to the thread root.
    pub fn parent(&self) -> Option<&Tag> {
        self.events()
            .find(|t| t.marker == Some(Marker::Reply))
            .or_else(|| self.root())
            .or_else(|| self.events().last())
    }

    pub fn contains_pubkey(&self, key: &str) -> bool {
        self.pubkeys().any(|t| t.value == key)
    }

    pub fn to_arrays(&self) -> Vec<Vec<String>> {
        self.0.iter().map(Tag::to_array).collect()
    }
}

impl FromIterator<Tag> for TagSet {
    fn from_iter<I: IntoIterator<Item = Tag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
