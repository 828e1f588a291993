//! Playlist notifications
//!
//! Every observable state change of the controller is announced as a
//! [`PlaylistEvent`]. Observers register through [`EventBus::subscribe`] and
//! receive events on their own channel; disconnected observers are pruned on
//! the next emit.

use crate::types::Locator;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use tracing::trace;

/// Events emitted by the playlist controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum PlaylistEvent {
    /// A track played to its end
    TrackFinished {
        /// Locator of the finished track
        locator: Locator,
    },

    /// The last track finished naturally
    PlaylistEnded,

    /// Playback stopped
    Stopped,

    /// Playback paused
    Paused,

    /// Playback started or resumed by an explicit request
    #[serde(rename = "play")]
    Resumed,

    /// A track finished decoding and is playable
    TrackLoaded {
        /// Locator of the loaded track
        locator: Locator,
    },

    /// Fetching or decoding a track failed
    TrackLoadFailed {
        /// Locator of the failed track
        locator: Locator,
        /// Human-readable reason
        message: String,
    },

    /// A track was added to the playlist
    TrackAdded {
        /// Locator of the new track
        locator: Locator,
    },

    /// A track was removed or replaced
    TrackRemoved {
        /// Locator of the removed track
        locator: Locator,
    },

    /// Output gain changed
    VolumeChanged {
        /// Previous gain
        from: f32,
        /// New gain
        to: f32,
    },

    /// Output muted
    Muted,

    /// Output unmuted
    Unmuted,

    /// Cursor moved forward
    SkipNext {
        /// Cursor before the move
        old_index: usize,
        /// Cursor after the move
        new_index: usize,
    },

    /// Cursor moved backward
    SkipBack {
        /// Cursor before the move
        old_index: usize,
        /// Cursor after the move
        new_index: usize,
    },
}

impl PlaylistEvent {
    /// Notification name, as used on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Self::TrackFinished { .. } => "trackfinished",
            Self::PlaylistEnded => "playlistended",
            Self::Stopped => "stopped",
            Self::Paused => "paused",
            Self::Resumed => "play",
            Self::TrackLoaded { .. } => "trackloaded",
            Self::TrackLoadFailed { .. } => "trackloadfailed",
            Self::TrackAdded { .. } => "trackadded",
            Self::TrackRemoved { .. } => "trackremoved",
            Self::VolumeChanged { .. } => "volumechanged",
            Self::Muted => "muted",
            Self::Unmuted => "unmuted",
            Self::SkipNext { .. } => "skipnext",
            Self::SkipBack { .. } => "skipback",
        }
    }
}

/// Subscriber registry
#[derive(Debug, Default)]
pub struct EventBus {
    subscribers: Vec<Sender<PlaylistEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer
    ///
    /// The receiver gets every event emitted after this call.
    pub fn subscribe(&mut self) -> Receiver<PlaylistEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Number of live observers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an event to every observer
    pub fn emit(&mut self, event: PlaylistEvent) {
        trace!(event = event.name(), "emit");
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}
