//! In-crate test doubles for the collaborator traits

use crate::engine::{AudioDecoder, CompletionNotifier, ContentFetcher, PlaybackEngine, PlaybackHandle};
use crate::error::{PlaybackError, Result};
use crate::types::{DecodedAudio, Locator};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a mock handle has been asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlePhase {
    Fresh,
    Started(Duration),
    Stopped,
}

#[derive(Debug)]
struct HandleRecord {
    phase: HandlePhase,
    notifier: Option<CompletionNotifier>,
}

#[derive(Debug, Default)]
struct EngineInner {
    gain: f32,
    handles: Vec<Arc<Mutex<HandleRecord>>>,
}

/// Engine that records handle lifecycles instead of producing sound
#[derive(Debug, Clone, Default)]
pub(crate) struct MockEngine {
    inner: Arc<Mutex<EngineInner>>,
    fail_starts: Arc<AtomicBool>,
}

impl MockEngine {
    pub(crate) fn new() -> Self {
        let engine = Self::default();
        engine.set_gain(1.0);
        engine
    }

    /// Make every subsequent `start` fail
    pub(crate) fn fail_starts(&self, fail: bool) {
        self.fail_starts.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn handles_created(&self) -> usize {
        self.inner.lock().unwrap().handles.len()
    }

    pub(crate) fn phase(&self, index: usize) -> HandlePhase {
        self.inner.lock().unwrap().handles[index].lock().unwrap().phase
    }

    pub(crate) fn last_phase(&self) -> HandlePhase {
        let count = self.handles_created();
        self.phase(count - 1)
    }

    /// Number of handles currently producing sound
    pub(crate) fn running(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .handles
            .iter()
            .filter(|h| matches!(h.lock().unwrap().phase, HandlePhase::Started(_)))
            .count()
    }

    /// Simulate every running handle reaching the end of its buffer
    pub(crate) fn finish_running(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        let mut fired = 0;
        for handle in &inner.handles {
            let mut record = handle.lock().unwrap();
            if matches!(record.phase, HandlePhase::Started(_)) {
                record.phase = HandlePhase::Stopped;
                if let Some(notifier) = record.notifier.take() {
                    notifier.notify();
                    fired += 1;
                }
            }
        }
        fired
    }
}

struct MockHandle {
    record: Arc<Mutex<HandleRecord>>,
    fail_starts: Arc<AtomicBool>,
}

impl PlaybackHandle for MockHandle {
    fn arm(&mut self, notifier: CompletionNotifier) {
        self.record.lock().unwrap().notifier = Some(notifier);
    }

    fn disarm(&mut self) -> Option<CompletionNotifier> {
        self.record.lock().unwrap().notifier.take()
    }

    fn start(&mut self, offset: Duration) -> Result<()> {
        let mut record = self.record.lock().unwrap();
        if record.phase != HandlePhase::Fresh {
            return Err(PlaybackError::Engine("handle already used".into()));
        }
        if self.fail_starts.load(Ordering::SeqCst) {
            return Err(PlaybackError::Engine("output device lost".into()));
        }
        record.phase = HandlePhase::Started(offset);
        Ok(())
    }

    fn stop(&mut self) {
        let mut record = self.record.lock().unwrap();
        if let Some(notifier) = record.notifier.take() {
            // A real engine fires the hook when a started handle is stopped
            if matches!(record.phase, HandlePhase::Started(_)) {
                notifier.notify();
            }
        }
        record.phase = HandlePhase::Stopped;
    }
}

impl PlaybackEngine for MockEngine {
    fn create_handle(&self, _audio: Arc<DecodedAudio>) -> Result<Box<dyn PlaybackHandle>> {
        let record = Arc::new(Mutex::new(HandleRecord {
            phase: HandlePhase::Fresh,
            notifier: None,
        }));
        self.inner.lock().unwrap().handles.push(Arc::clone(&record));
        Ok(Box::new(MockHandle {
            record,
            fail_starts: Arc::clone(&self.fail_starts),
        }))
    }

    fn gain(&self) -> f32 {
        self.inner.lock().unwrap().gain
    }

    fn set_gain(&self, gain: f32) {
        self.inner.lock().unwrap().gain = gain;
    }
}

/// Fetcher serving the locator string itself as content
///
/// Locators listed in `failing` produce a fetch error.
#[derive(Debug, Default)]
pub(crate) struct MockFetcher {
    pub(crate) failing: Vec<String>,
}

impl ContentFetcher for MockFetcher {
    fn fetch(&self, locator: &Locator) -> Result<Vec<u8>> {
        if self.failing.iter().any(|f| f == locator.as_str()) {
            return Err(PlaybackError::Fetch(format!("{locator}: unreachable")));
        }
        Ok(locator.as_str().as_bytes().to_vec())
    }
}

/// Decoder producing silence with a per-locator duration (default 180 s)
#[derive(Debug, Default)]
pub(crate) struct MockDecoder {
    pub(crate) durations: HashMap<String, Duration>,
}

impl AudioDecoder for MockDecoder {
    fn decode(&self, locator: &Locator, _bytes: Vec<u8>) -> Result<DecodedAudio> {
        let duration = self
            .durations
            .get(locator.as_str())
            .copied()
            .unwrap_or(Duration::from_secs(180));
        // Low rate keeps test buffers small
        Ok(DecodedAudio::silence(duration, 100, 1))
    }
}
