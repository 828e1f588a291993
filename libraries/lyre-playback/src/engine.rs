//! Collaborator contracts
//!
//! The controller never fetches, decodes or mixes audio itself. Platform code
//! supplies these capabilities:
//!
//! - [`ContentFetcher`] turns a [`Locator`] into raw bytes
//! - [`AudioDecoder`] turns raw bytes into a [`DecodedAudio`] buffer
//! - [`PlaybackEngine`] creates one-shot [`PlaybackHandle`]s bound to a buffer
//!   and owns the shared output gain
//!
//! Fetching and decoding run on loader threads; everything else runs on the
//! thread that owns the controller.

use crate::error::Result;
use crate::types::{DecodedAudio, Locator};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::time::Duration;

/// Fetches raw content for a locator
pub trait ContentFetcher: Send + Sync {
    /// Read the complete content
    ///
    /// Fails with [`PlaybackError::Fetch`](crate::PlaybackError::Fetch) when the
    /// locator is unreachable or invalid.
    fn fetch(&self, locator: &Locator) -> Result<Vec<u8>>;
}

/// Decodes raw bytes into samples
pub trait AudioDecoder: Send + Sync {
    /// Decode the complete content
    ///
    /// The locator is passed as a format hint only.
    fn decode(&self, locator: &Locator, bytes: Vec<u8>) -> Result<DecodedAudio>;
}

/// Audio output engine
///
/// Owns the mixing graph and the single gain stage shared by all handles.
pub trait PlaybackEngine: Send + Sync {
    /// Create a fresh one-shot handle that will play `audio` into the output
    fn create_handle(&self, audio: Arc<DecodedAudio>) -> Result<Box<dyn PlaybackHandle>>;

    /// Current linear output gain
    fn gain(&self) -> f32;

    /// Set the linear output gain
    fn set_gain(&self, gain: f32);
}

/// One-shot playback primitive
///
/// A handle can be started at most once. After `stop()`, or after it played to
/// the end of its buffer, it is spent and a new one must be created.
pub trait PlaybackHandle: Send {
    /// Install the completion hook, replacing any previous one
    fn arm(&mut self, notifier: CompletionNotifier);

    /// Remove the completion hook so that nothing fires on a later stop
    fn disarm(&mut self) -> Option<CompletionNotifier>;

    /// Begin playback `offset` into the buffer
    fn start(&mut self, offset: Duration) -> Result<()>;

    /// Stop playback; a no-op on a handle that never started
    fn stop(&mut self);
}

/// Identity of a playback unit for routing asynchronous results
///
/// Not an addressing scheme: playlist operations address units by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitKey(pub(crate) u64);

/// Messages delivered to the controller's dispatch loop
#[derive(Debug)]
pub(crate) enum Dispatch {
    /// Fetch + decode finished for a unit
    Loaded {
        key: UnitKey,
        outcome: Result<DecodedAudio>,
    },

    /// A handle played to the end of its buffer
    HandleEnded { key: UnitKey, generation: u64 },
}

/// Completion hook for a [`PlaybackHandle`]
///
/// Consumed by [`notify`](Self::notify), so a handle can report completion at
/// most once.
#[derive(Debug)]
pub struct CompletionNotifier {
    key: UnitKey,
    generation: u64,
    tx: Sender<Dispatch>,
}

impl CompletionNotifier {
    pub(crate) fn new(key: UnitKey, generation: u64, tx: Sender<Dispatch>) -> Self {
        Self {
            key,
            generation,
            tx,
        }
    }

    /// Report that the handle reached the end of its buffer
    ///
    /// Safe to call from any thread, including an audio callback.
    pub fn notify(self) {
        // The controller may already be gone during shutdown
        let _ = self.tx.send(Dispatch::HandleEnded {
            key: self.key,
            generation: self.generation,
        });
    }
}
