//! Lyre - Playlist Playback
//!
//! Platform-agnostic playlist controller for Lyre.
//!
//! This crate provides:
//! - Playback units (play / pause / stop / seek over one-shot engine handles)
//! - An ordered playlist with a "now playing" cursor
//! - Auto-advance when a track finishes naturally
//! - Volume and mute with exact restore
//! - Event notifications for every observable change
//!
//! # Architecture
//!
//! `lyre-playback` never touches audio hardware, files or the network.
//! Platform code supplies three collaborators through traits:
//! - [`ContentFetcher`] - locator to raw bytes
//! - [`AudioDecoder`] - raw bytes to samples
//! - [`PlaybackEngine`] - one-shot handles and the shared output gain
//!
//! Loading runs on background threads. Results and completion reports are
//! queued and applied when the owner calls
//! [`PlaylistController::dispatch_pending`] or
//! [`PlaylistController::wait_dispatch`].
//!
//! # Example
//!
//! ```rust,no_run
//! use lyre_playback::{
//!     AudioDecoder, CompletionNotifier, ContentFetcher, DecodedAudio, Locator, PlaybackEngine,
//!     PlaybackHandle, PlaylistConfig, PlaylistController, PlaylistEvent, Result,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct Files;
//! impl ContentFetcher for Files {
//!     fn fetch(&self, locator: &Locator) -> Result<Vec<u8>> {
//!         Ok(std::fs::read(locator.as_str())?)
//!     }
//! }
//!
//! struct Silence;
//! impl AudioDecoder for Silence {
//!     fn decode(&self, _locator: &Locator, _bytes: Vec<u8>) -> Result<DecodedAudio> {
//!         Ok(DecodedAudio::silence(Duration::from_secs(3), 44_100, 2))
//!     }
//! }
//!
//! struct Null;
//! impl PlaybackEngine for Null {
//!     fn create_handle(&self, _audio: Arc<DecodedAudio>) -> Result<Box<dyn PlaybackHandle>> {
//!         Ok(Box::new(NullHandle(None)))
//!     }
//!     fn gain(&self) -> f32 { 1.0 }
//!     fn set_gain(&self, _gain: f32) {}
//! }
//!
//! struct NullHandle(Option<CompletionNotifier>);
//! impl PlaybackHandle for NullHandle {
//!     fn arm(&mut self, notifier: CompletionNotifier) { self.0 = Some(notifier); }
//!     fn disarm(&mut self) -> Option<CompletionNotifier> { self.0.take() }
//!     fn start(&mut self, _offset: Duration) -> Result<()> { Ok(()) }
//!     fn stop(&mut self) {}
//! }
//!
//! # fn main() -> Result<()> {
//! let mut playlist = PlaylistController::new(
//!     PlaylistConfig::default(),
//!     Arc::new(Null),
//!     Arc::new(Files),
//!     Arc::new(Silence),
//! )?;
//! let events = playlist.subscribe();
//!
//! playlist.add_tracks(["intro.flac", "song.mp3"]);
//! while !playlist.is_ready(0) {
//!     playlist.wait_dispatch(Duration::from_millis(100));
//! }
//! playlist.play()?;
//!
//! for event in events.try_iter() {
//!     if let PlaylistEvent::TrackFinished { locator } = event {
//!         println!("finished {locator}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod clock;
mod engine;
mod error;
mod events;
mod loader;
mod playlist;
#[cfg(test)]
mod testing;
pub mod types;
mod unit;
mod volume;

// Public exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use engine::{
    AudioDecoder, CompletionNotifier, ContentFetcher, PlaybackEngine, PlaybackHandle, UnitKey,
};
pub use error::{PlaybackError, Result};
pub use events::{EventBus, PlaylistEvent};
pub use playlist::PlaylistController;
pub use types::{DecodedAudio, Locator, PlaybackState, PlaylistConfig};
pub use unit::{PlaybackUnit, UnitHooks};
pub use volume::Volume;
