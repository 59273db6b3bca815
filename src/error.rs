//! # Error Types
//!
//! Error taxonomy for channel routing. "No candidate" is not part of it:
//! selection returns `Ok(None)` when nothing serves a (group, model) pair.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouterError {
    /// A channel id is listed as a candidate but has no record.
    #[error("data inconsistency: channel #{channel_id} is indexed but has no record, contact an administrator")]
    DataInconsistency { channel_id: i64 },

    /// The weighted draw finished without landing on a channel.
    #[error("no channel found, group: {group}, model: {model}, priority: {priority}")]
    SelectionExhausted {
        group: String,
        model: String,
        priority: i64,
    },

    /// Point lookup for an id the cache does not hold.
    #[error("channel #{0} no longer exists")]
    ChannelNotFound(i64),

    /// The persistent store failed to produce a snapshot.
    #[error("Store Error: {0}")]
    Store(String),

    #[error("Serialization Error: {0}")]
    Serialization(String),

    /// A channel or the process is configured in a way routing cannot use.
    #[error("Configuration Error: {0}")]
    Config(String),
}

impl RouterError {
    /// Whether this error signals that the index and record map diverged.
    pub fn is_data_inconsistency(&self) -> bool {
        matches!(self, RouterError::DataInconsistency { .. })
    }
}

/// # From Trait Implementations
///
/// Conversions used by the file-backed store so `?` works on its I/O path.
impl From<serde_json::Error> for RouterError {
    fn from(err: serde_json::Error) -> Self {
        RouterError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<std::io::Error> for RouterError {
    /// Not-found and permission problems are reported as store errors with a
    /// readable message; anything else keeps the raw I/O text.
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => {
                RouterError::Store("Channel store file not found".to_string())
            }
            std::io::ErrorKind::PermissionDenied => {
                RouterError::Store("Permission denied reading channel store".to_string())
            }
            _ => RouterError::Store(format!("I/O error: {}", err)),
        }
    }
}
