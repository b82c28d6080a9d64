//! Kind 0 profile metadata.

use serde::Serialize;

/// Profile fields published for each participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileMetadata {
    pub name: String,
    pub display_name: String,
    pub about: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl ProfileMetadata {
    /// Default profile for a generated participant.
    pub fn for_participant(name: &str) -> Self {
        let handle = name.to_lowercase().replace(' ', "_");
        Self {
            name: handle.clone(),
            display_name: name.to_string(),
            about: format!("{} joins the conversation.", name),
            picture: Some(format!("https://robohash.org/{}", handle)),
        }
    }
}
