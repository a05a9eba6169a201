//! Socket protocol between the daemon and detached clients.
//!
//! One JSON request per connection, answered by one newline-terminated JSON
//! response, after which the daemon closes the connection.

use serde::{Deserialize, Serialize};

use crate::search::SearchResult;

/// Error text for payloads that are not a well-formed request.
pub const INVALID_REQUEST_FORMAT: &str = "Invalid request format";

/// Error text for requests naming a command the daemon doesn't know.
pub const UNKNOWN_COMMAND: &str = "Unknown command";

/// Request sent by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum IpcRequest {
    Search { query: String },
    Play(PlayRequest),
}

impl IpcRequest {
    /// Decode a raw payload.
    ///
    /// `Err` carries the error text to send back: unparseable payloads and
    /// known commands with bad fields are an invalid format, anything else
    /// is an unknown command.
    pub fn parse(payload: &[u8]) -> Result<Self, &'static str> {
        let value: serde_json::Value =
            serde_json::from_slice(payload).map_err(|_| INVALID_REQUEST_FORMAT)?;

        match value.get("command").and_then(|c| c.as_str()) {
            Some("search") | Some("play") => {
                serde_json::from_value(value).map_err(|_| INVALID_REQUEST_FORMAT)
            }
            _ if value.is_null() => Err(INVALID_REQUEST_FORMAT),
            _ => Err(UNKNOWN_COMMAND),
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Self::Search { .. } => "search",
            Self::Play(_) => "play",
        }
    }
}

/// Everything needed to re-resolve and run an action on a search result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayRequest {
    pub item_key: String,
    pub session_key: String,
    pub category_key: String,
    pub item_index: usize,
    pub action_title: String,
}

/// Reply to `search`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub error: Option<String>,
    pub results: Option<Vec<SearchResult>>,
}

/// Reply to `play`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayResponse {
    pub error: Option<String>,
    pub success: bool,
}

/// Reply to unknown or malformed requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

/// Any response the daemon writes.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum IpcResponse {
    Search(SearchResponse),
    Play(PlayResponse),
    Error(ErrorResponse),
}

impl IpcResponse {
    pub fn search_ok(results: Vec<SearchResult>) -> Self {
        Self::Search(SearchResponse {
            error: None,
            results: Some(results),
        })
    }

    pub fn search_failed(error: impl Into<String>) -> Self {
        Self::Search(SearchResponse {
            error: Some(error.into()),
            results: None,
        })
    }

    pub fn play_ok() -> Self {
        Self::Play(PlayResponse {
            error: None,
            success: true,
        })
    }

    pub fn play_failed(error: impl Into<String>) -> Self {
        Self::Play(PlayResponse {
            error: Some(error.into()),
            success: false,
        })
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error(ErrorResponse {
            error: error.into(),
        })
    }

    /// Serialize as a single newline-terminated line
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| {
            // Only reachable if a result carries non-serializable data
            format!("{{\"error\":\"{}\"}}", INVALID_REQUEST_FORMAT)
        });
        line.push('\n');
        line
    }
}
