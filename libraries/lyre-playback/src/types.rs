//! Core types for playback management

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Opaque identifier for a piece of audio content
///
/// Usually a file path or an `http(s)://` URL. The core never interprets it;
/// only the content fetcher does.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Locator(String);

impl Locator {
    /// Create a locator from anything string-like
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    /// Borrow the raw locator string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File extension of the last path segment, lowercased
    ///
    /// Query strings and fragments are ignored so that
    /// `https://host/a/song.MP3?token=1` yields `mp3`.
    pub fn extension(&self) -> Option<String> {
        let path = self.0.split(['?', '#']).next().unwrap_or_default();
        Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Locator {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Locator {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Path> for Locator {
    fn from(value: &Path) -> Self {
        Self(value.to_string_lossy().into_owned())
    }
}

impl AsRef<str> for Locator {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Playback state of a single unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Not playing; position reads as zero
    Stopped,

    /// Currently playing
    Playing,

    /// Paused mid-track; position is frozen
    Paused,
}

/// Fully decoded audio held in memory
///
/// Samples are interleaved `f32` in `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

impl DecodedAudio {
    /// Wrap interleaved samples
    ///
    /// Fails with [`PlaybackError::Decode`] when the sample rate or channel
    /// count is zero, or when the sample count is not a whole number of frames.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        if sample_rate == 0 {
            return Err(PlaybackError::Decode("sample rate must be non-zero".into()));
        }
        if channels == 0 {
            return Err(PlaybackError::Decode("channel count must be non-zero".into()));
        }
        if samples.len() % channels as usize != 0 {
            return Err(PlaybackError::Decode(format!(
                "{} samples do not divide into {} channels",
                samples.len(),
                channels
            )));
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Silent buffer of the given length
    pub fn silence(duration: Duration, sample_rate: u32, channels: u16) -> Self {
        let frames = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self {
            samples: vec![0.0; frames * channels as usize],
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        }
    }

    /// Interleaved samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    /// Total playable duration
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Frame index for a time offset, clamped to the buffer length
    pub fn frame_at(&self, offset: Duration) -> usize {
        let frame = (offset.as_secs_f64() * self.sample_rate as f64) as usize;
        frame.min(self.frames())
    }
}

/// Configuration for the playlist controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    /// Initial output gain (default: 1.0)
    pub volume: f32,

    /// Upper bound for the output gain (default: 1.0)
    pub max_gain: f32,

    /// Number of background threads fetching and decoding tracks (default: 2)
    pub loader_threads: usize,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            max_gain: 1.0,
            loader_threads: 2,
        }
    }
}

impl PlaylistConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.max_gain.is_finite() || self.max_gain <= 0.0 {
            return Err(PlaybackError::Config(format!(
                "max_gain must be a positive number, got {}",
                self.max_gain
            )));
        }
        if !self.volume.is_finite() || self.volume < 0.0 || self.volume > self.max_gain {
            return Err(PlaybackError::Config(format!(
                "volume must lie in [0, {}], got {}",
                self.max_gain, self.volume
            )));
        }
        if self.loader_threads == 0 {
            return Err(PlaybackError::Config(
                "loader_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PlaylistConfig::default();
        assert_eq!(config.volume, 1.0);
        assert_eq!(config.max_gain, 1.0);
        assert_eq!(config.loader_threads, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_rejects_volume_above_max_gain() {
        let config = PlaylistConfig {
            volume: 1.5,
            ..PlaylistConfig::default()
        };
        assert!(matches!(config.validate(), Err(PlaybackError::Config(_))));
    }

    #[test]
    fn config_rejects_zero_loader_threads() {
        let config = PlaylistConfig {
            loader_threads: 0,
            ..PlaylistConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_fills_missing_fields_with_defaults() {
        let config: PlaylistConfig = serde_json::from_str(r#"{ "volume": 0.5 }"#).unwrap();
        assert_eq!(config.volume, 0.5);
        assert_eq!(config.loader_threads, 2);
    }

    #[test]
    fn locator_extension_ignores_query() {
        assert_eq!(
            Locator::from("https://cdn.example/a/Song.MP3?sig=abc").extension(),
            Some("mp3".to_string())
        );
        assert_eq!(Locator::from("/music/track.flac").extension(), Some("flac".to_string()));
        assert_eq!(Locator::from("no-extension").extension(), None);
    }

    #[test]
    fn decoded_audio_duration() {
        let audio = DecodedAudio::new(vec![0.0; 44100 * 2 * 3], 44100, 2).unwrap();
        assert_eq!(audio.frames(), 44100 * 3);
        assert_eq!(audio.duration(), Duration::from_secs(3));
        assert_eq!(audio.frame_at(Duration::from_secs(1)), 44100);
        assert_eq!(audio.frame_at(Duration::from_secs(10)), audio.frames());
    }

    #[test]
    fn decoded_audio_rejects_partial_frames() {
        assert!(DecodedAudio::new(vec![0.0; 3], 44100, 2).is_err());
        assert!(DecodedAudio::new(vec![0.0; 4], 0, 2).is_err());
        assert!(DecodedAudio::new(vec![0.0; 4], 44100, 0).is_err());
    }

    #[test]
    fn silence_has_requested_length() {
        let audio = DecodedAudio::silence(Duration::from_millis(500), 48000, 2);
        assert_eq!(audio.frames(), 24000);
        assert!(audio.samples().iter().all(|s| *s == 0.0));
    }
}
