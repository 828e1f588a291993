//! Playback unit - one playlist item and its state machine
//!
//! A unit owns the decoded buffer of one item, the single live one-shot
//! handle playing it, and the play/pause/stop/seek state.
//!
//! Handles cannot be restarted, so a fresh one is prepared at every point
//! where the previous one becomes unusable (load, pause, stop, seek while
//! playing, natural completion). `play()` therefore never creates a handle.
//!
//! Position is derived from an injected [`Clock`]:
//!
//! ```text
//! Playing:  start_offset + (now - started_at)
//! Paused:   paused_offset
//! Stopped:  0
//! ```

use crate::clock::Clock;
use crate::engine::{CompletionNotifier, Dispatch, PlaybackEngine, PlaybackHandle, UnitKey};
use crate::error::{PlaybackError, Result};
use crate::types::{DecodedAudio, Locator, PlaybackState};
use crossbeam_channel::Sender;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type LocatorHook = Box<dyn FnMut(&Locator) + Send>;
type LoadFailedHook = Box<dyn FnMut(&Locator, &PlaybackError) + Send>;

/// Callbacks a unit invokes on lifecycle events
pub struct UnitHooks {
    /// The live handle played to the end of the buffer
    pub on_finished: LocatorHook,

    /// Decoding finished and the unit is playable
    pub on_loaded: LocatorHook,

    /// Fetching or decoding failed
    pub on_load_failed: LoadFailedHook,
}

impl Default for UnitHooks {
    fn default() -> Self {
        Self {
            on_finished: Box::new(|_| {}),
            on_loaded: Box::new(|_| {}),
            on_load_failed: Box::new(|_, _| {}),
        }
    }
}

impl fmt::Debug for UnitHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHooks").finish_non_exhaustive()
    }
}

/// One playlist item
pub struct PlaybackUnit {
    key: UnitKey,
    locator: Locator,

    audio: Option<Arc<DecodedAudio>>,
    load_error: Option<String>,

    handle: Option<Box<dyn PlaybackHandle>>,
    // Bumped for every prepared handle; completions from older ones are stale
    generation: u64,

    state: PlaybackState,
    started_at: Duration,
    start_offset: Duration,
    paused_offset: Duration,

    engine: Arc<dyn PlaybackEngine>,
    clock: Arc<dyn Clock>,
    completions: Sender<Dispatch>,
    hooks: UnitHooks,
}

impl PlaybackUnit {
    pub(crate) fn new(
        key: UnitKey,
        locator: Locator,
        engine: Arc<dyn PlaybackEngine>,
        clock: Arc<dyn Clock>,
        completions: Sender<Dispatch>,
        hooks: UnitHooks,
    ) -> Self {
        Self {
            key,
            locator,
            audio: None,
            load_error: None,
            handle: None,
            generation: 0,
            state: PlaybackState::Stopped,
            started_at: Duration::ZERO,
            start_offset: Duration::ZERO,
            paused_offset: Duration::ZERO,
            engine,
            clock,
            completions,
            hooks,
        }
    }

    pub(crate) fn key(&self) -> UnitKey {
        self.key
    }

    /// Locator this unit was created for
    pub fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Whether the audio has been decoded
    pub fn is_ready(&self) -> bool {
        self.audio.is_some()
    }

    /// Load failure message, if fetching or decoding failed
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Decoded duration
    pub fn duration(&self) -> Result<Duration> {
        self.audio
            .as_ref()
            .map(|audio| audio.duration())
            .ok_or(PlaybackError::NotReady)
    }

    /// Current position
    ///
    /// Never exceeds the decoded duration, and never decreases while playing
    /// unless the position is set explicitly.
    pub fn position(&self) -> Duration {
        match self.state {
            PlaybackState::Stopped => Duration::ZERO,
            PlaybackState::Paused => self.paused_offset,
            PlaybackState::Playing => {
                let elapsed = self.clock.now().saturating_sub(self.started_at);
                let position = self.start_offset + elapsed;
                match &self.audio {
                    Some(audio) => position.min(audio.duration()),
                    None => position,
                }
            }
        }
    }

    // ===== State machine =====

    /// Start or resume playback
    ///
    /// Returns `true` if the state changed, `false` if already playing.
    pub fn play(&mut self) -> Result<bool> {
        self.ensure_ready()?;
        match self.state {
            PlaybackState::Playing => Ok(false),
            PlaybackState::Stopped => {
                self.start_at(Duration::ZERO)?;
                Ok(true)
            }
            PlaybackState::Paused => {
                self.start_at(self.paused_offset)?;
                Ok(true)
            }
        }
    }

    /// Pause playback, freezing the position
    ///
    /// Returns `true` if the state changed.
    pub fn pause(&mut self) -> Result<bool> {
        self.ensure_ready()?;
        if self.state != PlaybackState::Playing {
            return Ok(false);
        }

        self.paused_offset = self.position();
        self.state = PlaybackState::Paused;
        self.retire_handle()?;
        debug!(locator = %self.locator, position_ms = self.paused_offset.as_millis() as u64, "paused");
        Ok(true)
    }

    /// Stop playback and rewind
    ///
    /// Returns `true` if the state changed.
    pub fn stop(&mut self) -> Result<bool> {
        if self.state == PlaybackState::Stopped {
            return Ok(false);
        }

        self.state = PlaybackState::Stopped;
        self.paused_offset = Duration::ZERO;
        self.retire_handle()?;
        debug!(locator = %self.locator, "stopped");
        Ok(true)
    }

    /// Move playback to `position`
    ///
    /// Paused: only the frozen position changes. Stopped: playback starts at
    /// `position`. Playing: playback restarts at `position` on a fresh handle.
    ///
    /// Returns `true` if the state changed (Stopped to Playing).
    pub fn set_position(&mut self, position: Duration) -> Result<bool> {
        let duration = self.duration()?;
        if position >= duration {
            return Err(PlaybackError::OutOfRange { position, duration });
        }

        match self.state {
            PlaybackState::Paused => {
                self.paused_offset = position;
                Ok(false)
            }
            PlaybackState::Stopped => {
                self.start_at(position)?;
                Ok(true)
            }
            PlaybackState::Playing => {
                let restarted = self.retire_handle().and_then(|()| self.start_at(position));
                if let Err(e) = restarted {
                    // The old handle is already silenced
                    self.state = PlaybackState::Stopped;
                    self.paused_offset = Duration::ZERO;
                    warn!(locator = %self.locator, error = %e, "seek could not restart playback");
                    return Err(e);
                }
                Ok(false)
            }
        }
    }

    // ===== Dispatch =====

    /// Apply the result of the background load
    pub(crate) fn finish_load(&mut self, outcome: Result<DecodedAudio>) {
        if self.audio.is_some() {
            warn!(locator = %self.locator, "duplicate load result ignored");
            return;
        }

        let outcome = outcome.and_then(|audio| {
            self.audio = Some(Arc::new(audio));
            self.prepare_handle()
        });

        match outcome {
            Ok(()) => {
                self.load_error = None;
                (self.hooks.on_loaded)(&self.locator);
            }
            Err(e) => {
                self.audio = None;
                self.handle = None;
                self.load_error = Some(e.to_string());
                (self.hooks.on_load_failed)(&self.locator, &e);
            }
        }
    }

    /// Handle a completion reported by a handle
    ///
    /// Returns `true` if it was the live handle finishing while playing.
    pub(crate) fn handle_ended(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.state != PlaybackState::Playing {
            debug!(
                locator = %self.locator,
                generation,
                live = self.generation,
                "stale completion ignored"
            );
            return false;
        }

        // The finished handle is spent
        self.handle = None;
        self.state = PlaybackState::Stopped;
        self.paused_offset = Duration::ZERO;
        if let Err(e) = self.prepare_handle() {
            warn!(locator = %self.locator, error = %e, "could not prepare handle after completion");
        }

        (self.hooks.on_finished)(&self.locator);
        true
    }

    // ===== Handle lifecycle =====

    fn ensure_ready(&self) -> Result<()> {
        if self.audio.is_some() {
            Ok(())
        } else {
            Err(PlaybackError::NotReady)
        }
    }

    /// Start the live handle at `offset` and anchor the position to it
    fn start_at(&mut self, offset: Duration) -> Result<()> {
        if self.handle.is_none() {
            // An earlier prepare failed; try again
            self.prepare_handle()?;
        }
        let notifier = CompletionNotifier::new(self.key, self.generation, self.completions.clone());
        let handle = self.handle.as_mut().ok_or(PlaybackError::NotReady)?;

        handle.arm(notifier);
        if let Err(e) = handle.start(offset) {
            handle.disarm();
            return Err(e);
        }

        self.started_at = self.clock.now();
        self.start_offset = offset;
        self.paused_offset = Duration::ZERO;
        self.state = PlaybackState::Playing;
        debug!(locator = %self.locator, offset_ms = offset.as_millis() as u64, "playing");
        Ok(())
    }

    /// Silence the live handle and replace it with a fresh one
    fn retire_handle(&mut self) -> Result<()> {
        if let Some(mut handle) = self.handle.take() {
            // Disarm first so stopping cannot look like a natural finish
            handle.disarm();
            handle.stop();
        }
        self.prepare_handle()
    }

    fn prepare_handle(&mut self) -> Result<()> {
        let audio = self.audio.as_ref().ok_or(PlaybackError::NotReady)?;
        let handle = self.engine.create_handle(Arc::clone(audio))?;
        self.generation += 1;
        self.handle = Some(handle);
        Ok(())
    }
}

impl Drop for PlaybackUnit {
    fn drop(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.disarm();
            handle.stop();
        }
    }
}

impl fmt::Debug for PlaybackUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackUnit")
            .field("locator", &self.locator)
            .field("state", &self.state)
            .field("ready", &self.is_ready())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}
