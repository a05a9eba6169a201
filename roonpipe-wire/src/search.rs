//! Search results returned by the daemon.

use serde::{Deserialize, Serialize};

/// A named operation offered for a search result ("Play Now", "Queue", ...).
///
/// Roon exposes no stable action identifier, so the title is the identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    pub title: String,
}

impl Action {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Kind of a search result, inferred from its category title.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
    Artist,
    Album,
    Composer,
    Playlist,
    #[default]
    Track,
    Work,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Album => "album",
            Self::Composer => "composer",
            Self::Playlist => "playlist",
            Self::Track => "track",
            Self::Work => "work",
        }
    }

    /// Capitalized label, used for placeholder titles ("Unknown Album")
    pub fn label(&self) -> &'static str {
        match self {
            Self::Artist => "Artist",
            Self::Album => "Album",
            Self::Composer => "Composer",
            Self::Playlist => "Playlist",
            Self::Track => "Track",
            Self::Work => "Work",
        }
    }
}

impl std::fmt::Display for ResultType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One actionable item found by a search.
///
/// `category_key` + `index` locate the item again at play time; `item_key`
/// is informational only and may be stale by then.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub subtitle: String,
    pub item_key: String,
    /// Local path of the cached artwork
    pub image: Option<String>,
    pub hint: Option<String>,
    #[serde(alias = "sessionKey")]
    pub session_key: String,
    #[serde(rename = "type")]
    pub result_type: ResultType,
    pub category_key: String,
    /// Position of the item inside its category at search time
    pub index: usize,
    pub actions: Vec<Action>,
}
