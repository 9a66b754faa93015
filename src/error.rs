//! # Error Types
//!
//! Every fallible library operation returns [`Result`], carrying an
//! [`AffirmError`]. None of these are fatal: generation and import errors are
//! meant to be shown to the user for a retry, and playback errors are only
//! returned after the audio session has been torn down.

use thiserror::Error;

use crate::playlist::PlaylistId;

/// Result type alias using `AffirmError`
pub type Result<T> = std::result::Result<T, AffirmError>;

#[derive(Error, Debug)]
pub enum AffirmError {
    /// Category key is not registered
    #[error("Unknown category: {0}")]
    InvalidCategory(String),

    /// Fewer than the required number of usable affirmations survived filtering
    #[error("Not enough affirmations generated: {found} (minimum: {required})")]
    InsufficientResults { found: usize, required: usize },

    /// Capture device denied, or audio could not be decoded/played
    #[error("Audio resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Imported playlist document is missing required fields
    #[error("Malformed playlist import: {0}")]
    MalformedImport(String),

    /// At least one playlist must always exist
    #[error("Cannot delete the last remaining playlist")]
    LastPlaylist,

    #[error("Playlist not found: {0}")]
    PlaylistNotFound(PlaylistId),

    #[error("Track {index} not found in playlist {playlist}")]
    TrackNotFound { playlist: PlaylistId, index: usize },

    /// A category table failed validation
    #[error("Invalid category definition: {0}")]
    InvalidDefinition(String),

    /// Recording store failures
    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AffirmError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedImport(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the caller can reasonably offer the user a retry.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidCategory(_)
                | Self::InsufficientResults { .. }
                | Self::ResourceUnavailable(_)
                | Self::MalformedImport(_)
                | Self::LastPlaylist
        )
    }
}

impl From<rusqlite::Error> for AffirmError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
