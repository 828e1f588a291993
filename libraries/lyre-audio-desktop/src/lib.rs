//! Desktop collaborators for the Lyre playlist controller
//!
//! This crate provides the platform side of `lyre-playback`:
//!
//! - [`SourceFetcher`] - file paths, `file://` and `http(s)://` locators
//! - [`SymphoniaDecoder`] - whole-file decoding to stereo f32, resampled
//!   to the output rate
//! - [`CpalEngine`] - default output device, one mixer voice per started
//!   handle, shared gain
//!
//! # Example
//!
//! ```no_run
//! use lyre_audio_desktop::{CpalEngine, SourceFetcher, SymphoniaDecoder};
//! use lyre_playback::{PlaylistConfig, PlaylistController};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = CpalEngine::new()?;
//! let decoder = SymphoniaDecoder::with_output_rate(engine.sample_rate());
//!
//! let mut playlist = PlaylistController::new(
//!     PlaylistConfig::default(),
//!     Arc::new(engine),
//!     Arc::new(SourceFetcher::new()?),
//!     Arc::new(decoder),
//! )?;
//! playlist.add_track("/music/song.flac");
//! # Ok(())
//! # }
//! ```

mod decode;
mod engine;
mod error;
mod fetch;

pub use decode::SymphoniaDecoder;
pub use engine::{CpalEngine, MixerEngine, MixerHandle};
pub use error::{AudioError, Result};
pub use fetch::{Source, SourceFetcher};
