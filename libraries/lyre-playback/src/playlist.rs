//! Playlist controller - sequencing, volume and notifications
//!
//! Owns the ordered list of [`PlaybackUnit`]s and a cursor into it. Transport
//! operations (play, pause, stop, seek) only ever reach the unit at the
//! cursor. Inserting or removing items before the cursor shifts it so it
//! keeps addressing the same unit.
//!
//! # Dispatch
//!
//! Decode results and handle completions arrive asynchronously on one
//! channel. Nothing changes until the owner drains it with
//! [`PlaylistController::dispatch_pending`] or
//! [`PlaylistController::wait_dispatch`], so every transition happens on the
//! owner's thread:
//!
//! ```text
//! loader threads ──┐
//!                  ├──> dispatch channel ──> unit ──hooks──> notices ──> policy
//! engine callback ─┘
//! ```
//!
//! # End of playlist
//!
//! A track finishing naturally at the last index emits
//! [`PlaylistEvent::PlaylistEnded`]. An explicit [`advance`](PlaylistController::advance)
//! at the last index is a silent no-op. Auto-advance skips items that failed
//! to load; when none is left the playlist ends.

use crate::clock::{Clock, MonotonicClock};
use crate::engine::{AudioDecoder, ContentFetcher, Dispatch, PlaybackEngine, UnitKey};
use crate::error::{PlaybackError, Result};
use crate::events::{EventBus, PlaylistEvent};
use crate::loader::TrackLoader;
use crate::types::{Locator, PlaybackState, PlaylistConfig};
use crate::unit::{PlaybackUnit, UnitHooks};
use crate::volume::Volume;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a unit reported through its hooks
#[derive(Debug)]
enum UnitNotice {
    Finished(UnitKey),
    Loaded(UnitKey),
    LoadFailed(UnitKey, String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Next,
    Back,
}

/// Playlist-aware playback controller
pub struct PlaylistController {
    items: Vec<PlaybackUnit>,
    cursor: usize,

    volume: Volume,
    engine: Arc<dyn PlaybackEngine>,
    clock: Arc<dyn Clock>,

    dispatch_tx: Sender<Dispatch>,
    dispatch_rx: Receiver<Dispatch>,
    notice_tx: Sender<UnitNotice>,
    notice_rx: Receiver<UnitNotice>,

    events: EventBus,
    next_key: u64,

    // Unit that should start as soon as its decode completes
    pending_start: Option<UnitKey>,

    // Declared last so workers are joined after everything else is dropped
    loader: TrackLoader,
}

impl PlaylistController {
    /// Create a controller and start its loader threads
    ///
    /// The engine's output gain is set to `config.volume`.
    pub fn new(
        config: PlaylistConfig,
        engine: Arc<dyn PlaybackEngine>,
        fetcher: Arc<dyn ContentFetcher>,
        decoder: Arc<dyn AudioDecoder>,
    ) -> Result<Self> {
        config.validate()?;

        let (dispatch_tx, dispatch_rx) = unbounded();
        let (notice_tx, notice_rx) = unbounded();
        let loader = TrackLoader::spawn(config.loader_threads, fetcher, decoder, dispatch_tx.clone())?;

        engine.set_gain(config.volume);
        info!(
            volume = config.volume,
            loader_threads = config.loader_threads,
            "playlist controller ready"
        );

        Ok(Self {
            items: Vec::new(),
            cursor: 0,
            volume: Volume::new(config.max_gain),
            engine,
            clock: Arc::new(MonotonicClock::new()),
            dispatch_tx,
            dispatch_rx,
            notice_tx,
            notice_rx,
            events: EventBus::new(),
            next_key: 0,
            pending_start: None,
            loader,
        })
    }

    /// Replace the clock used for position tracking of units added from now on
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Register an observer for playlist events
    pub fn subscribe(&mut self) -> Receiver<PlaylistEvent> {
        self.events.subscribe()
    }

    // ===== Introspection =====

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the playlist has no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Index of the "now playing" item
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Locators in playlist order
    pub fn locators(&self) -> Vec<&Locator> {
        self.items.iter().map(PlaybackUnit::locator).collect()
    }

    /// Unit at `index`
    pub fn unit(&self, index: usize) -> Option<&PlaybackUnit> {
        self.items.get(index)
    }

    /// Unit at the cursor
    pub fn current(&self) -> Option<&PlaybackUnit> {
        self.items.get(self.cursor)
    }

    /// State of the unit at the cursor (`Stopped` when empty)
    pub fn state(&self) -> PlaybackState {
        self.current()
            .map(PlaybackUnit::state)
            .unwrap_or(PlaybackState::Stopped)
    }

    /// Whether the item at `index` has been decoded
    pub fn is_ready(&self, index: usize) -> bool {
        self.items.get(index).is_some_and(PlaybackUnit::is_ready)
    }

    // ===== Transport =====

    /// Start or resume the current item
    pub fn play(&mut self) -> Result<()> {
        let Some(unit) = self.items.get_mut(self.cursor) else {
            return Ok(());
        };
        if unit.play()? {
            self.events.emit(PlaylistEvent::Resumed);
        }
        Ok(())
    }

    /// Pause the current item
    pub fn pause(&mut self) -> Result<()> {
        let Some(unit) = self.items.get_mut(self.cursor) else {
            return Ok(());
        };
        if unit.pause()? {
            self.events.emit(PlaylistEvent::Paused);
        }
        Ok(())
    }

    /// Stop the current item
    pub fn stop(&mut self) -> Result<()> {
        self.pending_start = None;
        let Some(unit) = self.items.get_mut(self.cursor) else {
            return Ok(());
        };
        if unit.stop()? {
            self.events.emit(PlaylistEvent::Stopped);
        }
        Ok(())
    }

    /// Skip forward
    ///
    /// The next item starts only if the current one was actively playing. At
    /// the last index this is a no-op without notification.
    pub fn advance(&mut self) -> Result<()> {
        if self.cursor + 1 >= self.items.len() {
            debug!(cursor = self.cursor, "advance at end of playlist ignored");
            return Ok(());
        }
        let was_playing = self.is_active();
        self.step(self.cursor + 1, was_playing, Direction::Next)
    }

    /// Skip backward
    ///
    /// Mirror of [`advance`](Self::advance); a no-op at index 0.
    pub fn skip_back(&mut self) -> Result<()> {
        if self.cursor == 0 || self.items.is_empty() {
            debug!("skip back at start of playlist ignored");
            return Ok(());
        }
        let was_playing = self.is_active();
        self.step(self.cursor - 1, was_playing, Direction::Back)
    }

    // ===== Playlist editing =====

    /// Append a track; decoding starts immediately
    pub fn add_track(&mut self, locator: impl Into<Locator>) {
        let unit = self.create_unit(locator.into());
        let locator = unit.locator().clone();
        self.items.push(unit);
        self.events.emit(PlaylistEvent::TrackAdded { locator });
    }

    /// Append several tracks in input order
    pub fn add_tracks<I, L>(&mut self, locators: I)
    where
        I: IntoIterator<Item = L>,
        L: Into<Locator>,
    {
        for locator in locators {
            self.add_track(locator);
        }
    }

    /// Insert a track before `index` (`index == len` appends)
    pub fn insert_track(&mut self, index: usize, locator: impl Into<Locator>) -> Result<()> {
        let len = self.items.len();
        if index > len {
            return Err(PlaybackError::IndexOutOfBounds { index, len });
        }

        let unit = self.create_unit(locator.into());
        let locator = unit.locator().clone();
        self.items.insert(index, unit);
        // Follow the unit the cursor addressed before the splice
        if len > 0 && index <= self.cursor {
            self.cursor += 1;
        }
        self.events.emit(PlaylistEvent::TrackAdded { locator });
        Ok(())
    }

    /// Remove the track at `index`
    pub fn remove_track(&mut self, index: usize) -> Result<()> {
        let len = self.items.len();
        if index >= len {
            return Err(PlaybackError::IndexOutOfBounds { index, len });
        }

        let was_active = index == self.cursor && self.state() != PlaybackState::Stopped;
        let unit = self.items.remove(index);
        if self.pending_start == Some(unit.key()) {
            self.pending_start = None;
        }
        let locator = unit.locator().clone();
        // Dropping the unit silences its handle
        drop(unit);

        if index < self.cursor {
            self.cursor -= 1;
        }
        self.clamp_cursor();
        if was_active {
            self.events.emit(PlaylistEvent::Stopped);
        }
        self.events.emit(PlaylistEvent::TrackRemoved { locator });
        Ok(())
    }

    /// Replace the track at `index` with a new one
    ///
    /// Emits only [`PlaylistEvent::TrackRemoved`] for the old track.
    pub fn replace_track(&mut self, index: usize, locator: impl Into<Locator>) -> Result<()> {
        let len = self.items.len();
        if index >= len {
            return Err(PlaybackError::IndexOutOfBounds { index, len });
        }

        let was_active = index == self.cursor && self.state() != PlaybackState::Stopped;
        let unit = self.create_unit(locator.into());
        let old = std::mem::replace(&mut self.items[index], unit);
        if self.pending_start == Some(old.key()) {
            self.pending_start = None;
        }
        let locator = old.locator().clone();
        drop(old);

        if was_active {
            self.events.emit(PlaylistEvent::Stopped);
        }
        self.events.emit(PlaylistEvent::TrackRemoved { locator });
        Ok(())
    }

    /// Stop playback and remove every track
    pub fn remove_all_tracks(&mut self) -> Result<()> {
        self.stop()?;
        for unit in std::mem::take(&mut self.items) {
            let locator = unit.locator().clone();
            drop(unit);
            self.events.emit(PlaylistEvent::TrackRemoved { locator });
        }
        self.cursor = 0;
        self.pending_start = None;
        Ok(())
    }

    // ===== Volume =====

    /// Set the output gain, clamped to `[0, max_gain]`
    ///
    /// Allowed while muted: the new gain is applied immediately and discarded
    /// by the next unmute, which restores the pre-mute gain.
    pub fn set_volume(&mut self, gain: f32) -> Result<()> {
        let to = self.volume.clamp(gain)?;
        let from = self.engine.gain();
        if to == from {
            return Ok(());
        }
        self.engine.set_gain(to);
        debug!(from, to, db = Volume::to_db(to), "volume changed");
        self.events.emit(PlaylistEvent::VolumeChanged { from, to });
        Ok(())
    }

    /// Current output gain
    pub fn volume(&self) -> f32 {
        self.engine.gain()
    }

    /// Mute, or restore the exact gain that was active before muting
    pub fn toggle_mute(&mut self) {
        if self.volume.is_muted() {
            let restored = self.volume.unmute();
            self.engine.set_gain(restored);
            self.events.emit(PlaylistEvent::Unmuted);
        } else {
            self.volume.mute(self.engine.gain());
            self.engine.set_gain(0.0);
            self.events.emit(PlaylistEvent::Muted);
        }
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.volume.is_muted()
    }

    // ===== Song accessors =====

    /// Duration of the item at `index`, or of the current item
    ///
    /// Zero when the playlist is empty or the index does not exist.
    pub fn song_duration(&self, index: Option<usize>) -> Result<Duration> {
        match self.items.get(index.unwrap_or(self.cursor)) {
            Some(unit) => unit.duration(),
            None => Ok(Duration::ZERO),
        }
    }

    /// Position of the current item (zero when empty)
    pub fn song_position(&self) -> Duration {
        self.current()
            .map(PlaybackUnit::position)
            .unwrap_or(Duration::ZERO)
    }

    /// Seek the current item
    ///
    /// Fails with [`PlaybackError::OutOfRange`] at or past the end of the
    /// track. Seeking a stopped item starts it.
    pub fn set_song_position(&mut self, position: Duration) -> Result<()> {
        let Some(unit) = self.items.get_mut(self.cursor) else {
            return Ok(());
        };
        if unit.set_position(position)? {
            self.events.emit(PlaylistEvent::Resumed);
        }
        Ok(())
    }

    // ===== Dispatch =====

    /// Apply every pending load result and completion without blocking
    ///
    /// Returns the number of messages handled.
    pub fn dispatch_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(message) = self.dispatch_rx.try_recv() {
            self.route(message);
            handled += 1;
        }
        handled
    }

    /// Block until at least one message arrives or `timeout` passes, then
    /// drain the rest
    ///
    /// Returns the number of messages handled (zero on timeout).
    pub fn wait_dispatch(&mut self, timeout: Duration) -> usize {
        match self.dispatch_rx.recv_timeout(timeout) {
            Ok(message) => {
                self.route(message);
                1 + self.dispatch_pending()
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }

    fn route(&mut self, message: Dispatch) {
        match message {
            Dispatch::Loaded { key, outcome } => match self.index_of(key) {
                Some(index) => self.items[index].finish_load(outcome),
                None => debug!(?key, "load finished for a removed track"),
            },
            Dispatch::HandleEnded { key, generation } => match self.index_of(key) {
                Some(index) => {
                    self.items[index].handle_ended(generation);
                }
                None => debug!(?key, "completion for a removed track"),
            },
        }

        while let Ok(notice) = self.notice_rx.try_recv() {
            self.apply_notice(notice);
        }
    }

    fn apply_notice(&mut self, notice: UnitNotice) {
        match notice {
            UnitNotice::Loaded(key) => {
                let Some(index) = self.index_of(key) else {
                    return;
                };
                let locator = self.items[index].locator().clone();
                info!(%locator, "track loaded");
                self.events.emit(PlaylistEvent::TrackLoaded { locator });

                if self.pending_start == Some(key) {
                    self.pending_start = None;
                    if index == self.cursor {
                        if let Err(e) = self.items[index].play() {
                            warn!(error = %e, "deferred start failed");
                        }
                    }
                }
            }
            UnitNotice::LoadFailed(key, message) => {
                let Some(index) = self.index_of(key) else {
                    return;
                };
                if self.pending_start == Some(key) {
                    self.pending_start = None;
                }
                let locator = self.items[index].locator().clone();
                self.events
                    .emit(PlaylistEvent::TrackLoadFailed { locator, message });
            }
            UnitNotice::Finished(key) => {
                let Some(index) = self.index_of(key) else {
                    return;
                };
                let locator = self.items[index].locator().clone();
                info!(%locator, "track finished");
                self.events.emit(PlaylistEvent::TrackFinished { locator });

                if index != self.cursor {
                    return;
                }
                match self.next_playable(index) {
                    Some(target) => {
                        if let Err(e) = self.step(target, true, Direction::Next) {
                            warn!(error = %e, "auto-advance failed");
                        }
                    }
                    None => {
                        info!("playlist ended");
                        self.events.emit(PlaylistEvent::PlaylistEnded);
                    }
                }
            }
        }
    }

    // ===== Internals =====

    fn step(&mut self, target: usize, was_playing: bool, direction: Direction) -> Result<()> {
        let old = self.cursor;
        self.pending_start = None;
        self.items[old].stop()?;
        self.cursor = target;

        let event = match direction {
            Direction::Next => PlaylistEvent::SkipNext {
                old_index: old,
                new_index: target,
            },
            Direction::Back => PlaylistEvent::SkipBack {
                old_index: old,
                new_index: target,
            },
        };
        self.events.emit(event);

        if !was_playing {
            return Ok(());
        }

        let unit = &mut self.items[target];
        if unit.is_ready() {
            unit.play()?;
        } else if unit.load_error().is_none() {
            debug!(locator = %unit.locator(), "start deferred until track is decoded");
            self.pending_start = Some(unit.key());
        } else {
            warn!(locator = %unit.locator(), "cannot start a track that failed to load");
        }
        Ok(())
    }

    /// Whether the cursor unit is playing or about to start
    fn is_active(&self) -> bool {
        match self.current() {
            Some(unit) => {
                unit.state() == PlaybackState::Playing || self.pending_start == Some(unit.key())
            }
            None => false,
        }
    }

    /// First item after `index` that has not failed to load
    fn next_playable(&self, index: usize) -> Option<usize> {
        (index + 1..self.items.len()).find(|&i| {
            let unit = &self.items[i];
            if let Some(error) = unit.load_error() {
                debug!(locator = %unit.locator(), error, "auto-advance skips failed track");
                false
            } else {
                true
            }
        })
    }

    fn create_unit(&mut self, locator: Locator) -> PlaybackUnit {
        let key = UnitKey(self.next_key);
        self.next_key += 1;

        let finished = self.notice_tx.clone();
        let loaded = self.notice_tx.clone();
        let failed = self.notice_tx.clone();
        let hooks = UnitHooks {
            on_finished: Box::new(move |_| {
                let _ = finished.send(UnitNotice::Finished(key));
            }),
            on_loaded: Box::new(move |_| {
                let _ = loaded.send(UnitNotice::Loaded(key));
            }),
            on_load_failed: Box::new(move |_, error| {
                let _ = failed.send(UnitNotice::LoadFailed(key, error.to_string()));
            }),
        };

        self.loader.request(key, locator.clone());
        PlaybackUnit::new(
            key,
            locator,
            Arc::clone(&self.engine),
            Arc::clone(&self.clock),
            self.dispatch_tx.clone(),
            hooks,
        )
    }

    fn index_of(&self, key: UnitKey) -> Option<usize> {
        self.items.iter().position(|unit| unit.key() == key)
    }

    /// Keep the cursor inside the list after it shrinks
    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.items.len().saturating_sub(1));
    }
}

impl std::fmt::Debug for PlaylistController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaylistController")
            .field("items", &self.items)
            .field("cursor", &self.cursor)
            .field("volume", &self.volume)
            .finish_non_exhaustive()
    }
}
