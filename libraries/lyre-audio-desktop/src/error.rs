/// Desktop audio errors
use lyre_playback::PlaybackError;
use thiserror::Error;

/// Result type for desktop audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

/// Desktop audio errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// No output device available
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device could not be queried or configured
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to start stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// Device sample format not supported by the mixer
    #[error("Unsupported sample format: {0}")]
    UnsupportedFormat(String),

    /// Locator could not be parsed or has an unsupported scheme
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Container or codec error
    #[error("Decode error: {0}")]
    Decode(String),

    /// Sample rate conversion error
    #[error("Sample rate conversion error: {0}")]
    ResampleError(String),

    /// The output thread is gone
    #[error("Output thread stopped")]
    OutputClosed,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::BuildStreamError> for AudioError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AudioError::StreamBuildError(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for AudioError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AudioError::PlayError(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for AudioError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AudioError::DeviceError(err.to_string())
    }
}

impl From<reqwest::Error> for AudioError {
    fn from(err: reqwest::Error) -> Self {
        AudioError::Http(err.to_string())
    }
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AudioError::Decode(err.to_string())
    }
}

impl From<AudioError> for PlaybackError {
    fn from(err: AudioError) -> Self {
        match err {
            AudioError::InvalidLocator(_) | AudioError::Http(_) | AudioError::Io(_) => {
                PlaybackError::Fetch(err.to_string())
            }
            AudioError::Decode(_) | AudioError::ResampleError(_) => {
                PlaybackError::Decode(err.to_string())
            }
            _ => PlaybackError::Engine(err.to_string()),
        }
    }
}
