use rest_store::StoreState;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A blog author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub id: u64,
    pub name: String,
}

/// A blog post with its author resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub author: Author,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: u64,
    pub label: String,
}

/// Payload for creating a post. Relations are sent as plain identifiers.
#[derive(Debug, Clone, Serialize)]
pub struct PostCreate {
    pub title: String,
    pub author: u64,
}

/// Decodes the rendered response of a settled store.
///
/// Relations render as their child store's response, so a resolved graph reads like a
/// nested document.
pub fn decode<T: DeserializeOwned>(state: &StoreState) -> Result<T, serde_json::Error> {
    serde_json::from_value(state.response.to_value())
}
