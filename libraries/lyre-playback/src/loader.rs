//! Background track loader
//!
//! Fetching and decoding can take from milliseconds (local WAV) to seconds
//! (remote FLAC), so it runs on worker threads. Results are sent back to the
//! controller's dispatch channel and applied on the controller's thread.
//!
//! ```text
//! Controller thread              Loader threads
//!        │                              │
//!        │  request(key, locator)       │
//!        │─────────────────────────────>│
//!        │                              │ fetch + decode
//!        │                              │
//!        │  Dispatch::Loaded            │
//!        │<─────────────────────────────│
//!        │                              │
//! ```

use crate::engine::{AudioDecoder, ContentFetcher, Dispatch, UnitKey};
use crate::error::{PlaybackError, Result};
use crate::types::{DecodedAudio, Locator};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, warn};

/// Request to load a track
#[derive(Debug, Clone)]
struct LoadRequest {
    key: UnitKey,
    locator: Locator,
}

/// Pool of loader threads sharing one request queue
pub(crate) struct TrackLoader {
    request_tx: Option<Sender<LoadRequest>>,
    workers: Vec<JoinHandle<()>>,
}

impl TrackLoader {
    /// Spawn `threads` workers that report to `results`
    pub(crate) fn spawn(
        threads: usize,
        fetcher: Arc<dyn ContentFetcher>,
        decoder: Arc<dyn AudioDecoder>,
        results: Sender<Dispatch>,
    ) -> Result<Self> {
        let (request_tx, request_rx) = unbounded::<LoadRequest>();

        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads.max(1) {
            let request_rx = request_rx.clone();
            let results = results.clone();
            let fetcher = Arc::clone(&fetcher);
            let decoder = Arc::clone(&decoder);

            let handle = thread::Builder::new()
                .name(format!("track-loader-{index}"))
                .spawn(move || Self::worker(&request_rx, &results, &*fetcher, &*decoder))?;
            workers.push(handle);
        }

        Ok(Self {
            request_tx: Some(request_tx),
            workers,
        })
    }

    /// Queue a load (non-blocking)
    pub(crate) fn request(&self, key: UnitKey, locator: Locator) {
        let Some(tx) = &self.request_tx else {
            return;
        };
        debug!(%locator, "queueing track load");
        if tx.send(LoadRequest { key, locator }).is_err() {
            warn!("track loader is gone, load request dropped");
        }
    }

    fn worker(
        requests: &Receiver<LoadRequest>,
        results: &Sender<Dispatch>,
        fetcher: &dyn ContentFetcher,
        decoder: &dyn AudioDecoder,
    ) {
        // Ends when the controller drops the request sender
        for request in requests {
            let start = Instant::now();
            let outcome = Self::load(&request.locator, fetcher, decoder);

            match &outcome {
                Ok(audio) => debug!(
                    locator = %request.locator,
                    duration_ms = audio.duration().as_millis() as u64,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "track decoded"
                ),
                Err(e) => warn!(locator = %request.locator, error = %e, "track failed to load"),
            }

            let message = Dispatch::Loaded {
                key: request.key,
                outcome,
            };
            if results.send(message).is_err() {
                break;
            }
        }
    }

    fn load(
        locator: &Locator,
        fetcher: &dyn ContentFetcher,
        decoder: &dyn AudioDecoder,
    ) -> Result<DecodedAudio> {
        let bytes = fetcher.fetch(locator)?;
        if bytes.is_empty() {
            return Err(PlaybackError::Fetch(format!("{locator}: no content")));
        }
        decoder.decode(locator, bytes)
    }
}

impl Drop for TrackLoader {
    fn drop(&mut self) {
        self.request_tx = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("track loader thread panicked");
            }
        }
    }
}
