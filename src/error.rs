//! Error type for menu navigation, search and playback.

use thiserror::Error;

/// Failures surfaced by search and action execution.
///
/// Exhausting the traversal depth is not an error: it yields an empty
/// result, so there is no variant for it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NavError {
    /// No Core connection or no tracked zone. Retrying won't help until that changes.
    #[error("{0}")]
    PreconditionFailed(String),

    /// Roon rejected (or never answered) a browse/load call.
    #[error("Remote error: {0}")]
    Remote(String),

    /// The item or action isn't where the caller expected it.
    #[error("{0}")]
    NotFound(String),
}

impl NavError {
    pub fn not_connected() -> Self {
        Self::PreconditionFailed("Roon Core not connected".to_string())
    }

    pub fn no_zone() -> Self {
        Self::PreconditionFailed("No active zone".to_string())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}

pub type NavResult<T> = std::result::Result<T, NavError>;
