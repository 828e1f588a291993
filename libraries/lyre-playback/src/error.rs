//! Error types for playback management

use std::time::Duration;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The unit has not finished decoding its audio yet
    #[error("Track not ready: audio has not been decoded yet")]
    NotReady,

    /// Seek target lies at or beyond the end of the track
    #[error("Cannot seek to {position:?}: track is only {duration:?} long")]
    OutOfRange {
        /// Requested position
        position: Duration,
        /// Decoded duration of the track
        duration: Duration,
    },

    /// Playlist index does not address an item
    #[error("Index {index} out of bounds for playlist of length {len}")]
    IndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Playlist length at the time of the call
        len: usize,
    },

    /// Volume is not a finite number
    #[error("Invalid volume: {0}")]
    InvalidVolume(f32),

    /// Content could not be fetched
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Raw bytes could not be decoded into samples
    #[error("Decode error: {0}")]
    Decode(String),

    /// The playback engine rejected an operation
    #[error("Engine error: {0}")]
    Engine(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Whether this error came from the load path (fetch or decode)
    pub fn is_load_failure(&self) -> bool {
        matches!(self, Self::Fetch(_) | Self::Decode(_) | Self::Io(_))
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
