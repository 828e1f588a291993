//! Shared test infrastructure for the integration tests

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use lyre_playback::{
    AudioDecoder, CompletionNotifier, ContentFetcher, DecodedAudio, Locator, ManualClock,
    PlaybackEngine, PlaybackError, PlaybackHandle, PlaylistConfig, PlaylistController,
    PlaylistEvent, Result,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fresh,
    Started(Duration),
    Stopped,
}

struct Slot {
    phase: Phase,
    notifier: Option<CompletionNotifier>,
}

#[derive(Default)]
struct EngineState {
    gain: f32,
    slots: Vec<Arc<Mutex<Slot>>>,
}

/// Engine that tracks handles instead of producing sound
#[derive(Clone, Default)]
pub struct RecordingEngine {
    state: Arc<Mutex<EngineState>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        let engine = Self::default();
        engine.state.lock().unwrap().gain = 1.0;
        engine
    }

    /// Handles currently producing sound
    pub fn running(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .slots
            .iter()
            .filter(|slot| matches!(slot.lock().unwrap().phase, Phase::Started(_)))
            .count()
    }

    pub fn handles_created(&self) -> usize {
        self.state.lock().unwrap().slots.len()
    }

    /// Start offset of the most recently started handle
    pub fn last_start(&self) -> Option<Duration> {
        self.state
            .lock()
            .unwrap()
            .slots
            .iter()
            .rev()
            .find_map(|slot| match slot.lock().unwrap().phase {
                Phase::Started(offset) => Some(offset),
                _ => None,
            })
    }

    /// Let every running handle reach the end of its buffer
    pub fn finish_running(&self) -> usize {
        let state = self.state.lock().unwrap();
        let mut fired = 0;
        for slot in &state.slots {
            let mut slot = slot.lock().unwrap();
            if matches!(slot.phase, Phase::Started(_)) {
                slot.phase = Phase::Stopped;
                if let Some(notifier) = slot.notifier.take() {
                    notifier.notify();
                    fired += 1;
                }
            }
        }
        fired
    }
}

struct RecordingHandle {
    slot: Arc<Mutex<Slot>>,
}

impl PlaybackHandle for RecordingHandle {
    fn arm(&mut self, notifier: CompletionNotifier) {
        self.slot.lock().unwrap().notifier = Some(notifier);
    }

    fn disarm(&mut self) -> Option<CompletionNotifier> {
        self.slot.lock().unwrap().notifier.take()
    }

    fn start(&mut self, offset: Duration) -> Result<()> {
        let mut slot = self.slot.lock().unwrap();
        if slot.phase != Phase::Fresh {
            return Err(PlaybackError::Engine("handle restarted".into()));
        }
        slot.phase = Phase::Started(offset);
        Ok(())
    }

    fn stop(&mut self) {
        let mut slot = self.slot.lock().unwrap();
        // Like a real engine: stopping a started handle fires its hook if armed
        if matches!(slot.phase, Phase::Started(_)) {
            if let Some(notifier) = slot.notifier.take() {
                notifier.notify();
            }
        }
        slot.phase = Phase::Stopped;
    }
}

impl PlaybackEngine for RecordingEngine {
    fn create_handle(&self, _audio: Arc<DecodedAudio>) -> Result<Box<dyn PlaybackHandle>> {
        let slot = Arc::new(Mutex::new(Slot {
            phase: Phase::Fresh,
            notifier: None,
        }));
        self.state.lock().unwrap().slots.push(Arc::clone(&slot));
        Ok(Box::new(RecordingHandle { slot }))
    }

    fn gain(&self) -> f32 {
        self.state.lock().unwrap().gain
    }

    fn set_gain(&self, gain: f32) {
        self.state.lock().unwrap().gain = gain;
    }
}

// ============================================================================
// Loader collaborators
// ============================================================================

/// Fetcher that fails for the listed locators
#[derive(Default)]
pub struct ListFetcher {
    pub unreachable: HashSet<String>,
}

impl ContentFetcher for ListFetcher {
    fn fetch(&self, locator: &Locator) -> Result<Vec<u8>> {
        if self.unreachable.contains(locator.as_str()) {
            return Err(PlaybackError::Fetch(format!("{locator}: not found")));
        }
        Ok(locator.as_str().as_bytes().to_vec())
    }
}

/// Decoder returning silence of a configured length (default 180 s)
#[derive(Default)]
pub struct SilenceDecoder {
    pub durations: HashMap<String, Duration>,
}

impl AudioDecoder for SilenceDecoder {
    fn decode(&self, locator: &Locator, _bytes: Vec<u8>) -> Result<DecodedAudio> {
        let duration = self
            .durations
            .get(locator.as_str())
            .copied()
            .unwrap_or(Duration::from_secs(180));
        Ok(DecodedAudio::silence(duration, 100, 2))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub playlist: PlaylistController,
    pub engine: RecordingEngine,
    pub clock: ManualClock,
    pub events: Receiver<PlaylistEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::build(ListFetcher::default(), SilenceDecoder::default())
    }

    pub fn with_durations(durations: &[(&str, u64)]) -> Self {
        let durations = durations
            .iter()
            .map(|(name, secs)| ((*name).to_string(), Duration::from_secs(*secs)))
            .collect();
        Self::build(ListFetcher::default(), SilenceDecoder { durations })
    }

    pub fn with_unreachable(locators: &[&str]) -> Self {
        let unreachable = locators.iter().map(|l| (*l).to_string()).collect();
        Self::build(ListFetcher { unreachable }, SilenceDecoder::default())
    }

    fn build(fetcher: ListFetcher, decoder: SilenceDecoder) -> Self {
        let engine = RecordingEngine::new();
        let clock = ManualClock::new();
        let mut playlist = PlaylistController::new(
            PlaylistConfig::default(),
            Arc::new(engine.clone()),
            Arc::new(fetcher),
            Arc::new(decoder),
        )
        .expect("controller")
        .with_clock(Arc::new(clock.clone()));
        let events = playlist.subscribe();
        Self {
            playlist,
            engine,
            clock,
            events,
        }
    }

    /// Dispatch until every track has finished loading (successfully or not)
    pub fn settle(&mut self) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let pending = (0..self.playlist.len()).any(|i| {
                let unit = self.playlist.unit(i).expect("unit");
                !unit.is_ready() && unit.load_error().is_none()
            });
            if !pending {
                return;
            }
            assert!(Instant::now() < deadline, "tracks did not load in time");
            self.playlist.wait_dispatch(Duration::from_millis(50));
        }
    }

    /// Let the playing track reach its end and apply the completion
    pub fn finish_current(&mut self) {
        let duration = self.playlist.song_duration(None).unwrap_or_default();
        self.clock.advance(duration);
        assert_eq!(self.engine.finish_running(), 1, "exactly one handle should be running");
        self.playlist.wait_dispatch(Duration::from_secs(1));
    }

    /// Everything emitted since the last call
    pub fn drain(&self) -> Vec<PlaylistEvent> {
        self.events.try_iter().collect()
    }

    /// Event names emitted since the last call
    pub fn drain_names(&self) -> Vec<&'static str> {
        self.drain().iter().map(PlaylistEvent::name).collect()
    }
}

pub fn loc(s: &str) -> Locator {
    Locator::from(s)
}
