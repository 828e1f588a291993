//! CPAL output engine
//!
//! **Architecture**: a dedicated output thread owns the CPAL `Stream`, which
//! is not `Send` on every platform. Handles talk to the audio callback only
//! through the shared mixer:
//!
//! ```text
//! MixerHandle::start ──push voice──> Mixer <──render── cpal callback
//! MixerHandle::stop  ──drop voice──>   │
//!                                      └── voice ran out ──> CompletionNotifier
//! ```
//!
//! The mixer applies the single shared output gain to every voice.
//! [`MixerEngine`] exposes the same mixing without a device, for offline
//! rendering and tests.

use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{bounded, Receiver, Sender};
use lyre_playback::{CompletionNotifier, DecodedAudio, PlaybackEngine, PlaybackError, PlaybackHandle};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

type NotifierSlot = Arc<Mutex<Option<CompletionNotifier>>>;

/// Lock that survives a panicked holder; mixer state stays usable
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// One started handle inside the mixer
struct Voice {
    id: u64,
    audio: Arc<DecodedAudio>,
    frame: usize,
    notifier: NotifierSlot,
}

/// Voices currently playing plus the shared gain stage
pub(crate) struct Mixer {
    voices: Mutex<Vec<Voice>>,
    gain: AtomicU32,
}

impl Mixer {
    pub(crate) fn new(gain: f32) -> Self {
        Self {
            voices: Mutex::new(Vec::new()),
            gain: AtomicU32::new(gain.to_bits()),
        }
    }

    pub(crate) fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Relaxed))
    }

    pub(crate) fn set_gain(&self, gain: f32) {
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    fn add(&self, voice: Voice) {
        lock(&self.voices).push(voice);
    }

    /// Remove a voice; `true` if it was still playing
    fn remove(&self, id: u64) -> bool {
        let mut voices = lock(&self.voices);
        let before = voices.len();
        voices.retain(|voice| voice.id != id);
        voices.len() != before
    }

    pub(crate) fn active(&self) -> usize {
        lock(&self.voices).len()
    }

    /// Mix every voice into `out` (interleaved, `channels` wide)
    ///
    /// Voices that reach the end of their buffer are dropped and their
    /// completion notifier fires.
    pub(crate) fn render(&self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if channels == 0 {
            return;
        }
        let gain = self.gain();

        lock(&self.voices).retain_mut(|voice| {
            let src_channels = voice.audio.channels() as usize;
            let samples = voice.audio.samples();
            let total = voice.audio.frames();

            for frame in out.chunks_exact_mut(channels) {
                if voice.frame >= total {
                    break;
                }
                let base = voice.frame * src_channels;
                for (ch, sample) in frame.iter_mut().enumerate() {
                    *sample += samples[base + ch.min(src_channels - 1)] * gain;
                }
                voice.frame += 1;
            }

            if voice.frame < total {
                return true;
            }
            if let Some(notifier) = lock(&voice.notifier).take() {
                notifier.notify();
            }
            false
        });
    }
}

/// One-shot handle playing a buffer through the mixer
pub struct MixerHandle {
    id: u64,
    audio: Arc<DecodedAudio>,
    mixer: Arc<Mixer>,
    notifier: NotifierSlot,
    started: bool,
}

impl PlaybackHandle for MixerHandle {
    fn arm(&mut self, notifier: CompletionNotifier) {
        *lock(&self.notifier) = Some(notifier);
    }

    fn disarm(&mut self) -> Option<CompletionNotifier> {
        lock(&self.notifier).take()
    }

    fn start(&mut self, offset: Duration) -> lyre_playback::Result<()> {
        if self.started {
            return Err(PlaybackError::Engine("handle can only be started once".into()));
        }
        self.started = true;
        self.mixer.add(Voice {
            id: self.id,
            audio: Arc::clone(&self.audio),
            frame: self.audio.frame_at(offset),
            notifier: Arc::clone(&self.notifier),
        });
        Ok(())
    }

    fn stop(&mut self) {
        // Stopping a live voice counts as its end, like an ended event
        if self.mixer.remove(self.id) {
            if let Some(notifier) = lock(&self.notifier).take() {
                notifier.notify();
            }
        }
    }
}

impl Drop for MixerHandle {
    fn drop(&mut self) {
        self.mixer.remove(self.id);
    }
}

/// Device-less [`PlaybackEngine`]: voices are mixed only when
/// [`render`](Self::render) is called
pub struct MixerEngine {
    mixer: Arc<Mixer>,
    next_id: AtomicU64,
    sample_rate: u32,
}

impl MixerEngine {
    /// Create an engine that expects buffers at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            mixer: Arc::new(Mixer::new(1.0)),
            next_id: AtomicU64::new(0),
            sample_rate,
        }
    }

    /// Sample rate buffers should be decoded to
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Mix the next `out.len() / channels` frames of every playing voice
    pub fn render(&self, out: &mut [f32], channels: usize) {
        self.mixer.render(out, channels);
    }

    /// Number of voices currently playing
    pub fn active_voices(&self) -> usize {
        self.mixer.active()
    }
}

impl PlaybackEngine for MixerEngine {
    fn create_handle(
        &self,
        audio: Arc<DecodedAudio>,
    ) -> lyre_playback::Result<Box<dyn PlaybackHandle>> {
        if audio.sample_rate() != self.sample_rate {
            debug!(
                buffer = audio.sample_rate(),
                output = self.sample_rate,
                "buffer rate differs from output rate; playback speed will be off"
            );
        }
        Ok(Box::new(MixerHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            audio,
            mixer: Arc::clone(&self.mixer),
            notifier: Arc::new(Mutex::new(None)),
            started: false,
        }))
    }

    fn gain(&self) -> f32 {
        self.mixer.gain()
    }

    fn set_gain(&self, gain: f32) {
        self.mixer.set_gain(gain);
    }
}

enum OutputCommand {
    Shutdown,
}

/// [`PlaybackEngine`] backed by the default CPAL output device
pub struct CpalEngine {
    engine: MixerEngine,
    channels: u16,
    command_tx: Sender<OutputCommand>,
    output_thread: Option<JoinHandle<()>>,
}

impl CpalEngine {
    /// Open the default output device and start streaming silence
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::DeviceNotFound)?;

        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let sample_rate = supported.sample_rate();
        let config = supported.config();
        let channels = config.channels;

        let engine = MixerEngine::new(sample_rate);
        let (command_tx, command_rx) = bounded::<OutputCommand>(4);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let mixer_for_thread = Arc::clone(&engine.mixer);
        let output_thread = thread::Builder::new()
            .name("lyre-output".to_string())
            .spawn(move || {
                Self::output_thread_run(
                    &device,
                    &config,
                    sample_format,
                    mixer_for_thread,
                    &ready_tx,
                    &command_rx,
                );
            })?;

        ready_rx.recv().map_err(|_| AudioError::OutputClosed)??;
        info!(sample_rate, channels, ?sample_format, "audio output ready");

        Ok(Self {
            engine,
            channels,
            command_tx,
            output_thread: Some(output_thread),
        })
    }

    /// Output sample rate; decoders should produce buffers at this rate
    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate()
    }

    /// Output channel count
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of voices currently playing
    pub fn active_voices(&self) -> usize {
        self.engine.active_voices()
    }

    fn output_thread_run(
        device: &cpal::Device,
        config: &cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
        mixer: Arc<Mixer>,
        ready: &Sender<Result<()>>,
        commands: &Receiver<OutputCommand>,
    ) {
        let stream = match build_stream_for_format(device, config, sample_format, mixer)
            .and_then(|stream| {
                stream.play()?;
                Ok(stream)
            }) {
            Ok(stream) => stream,
            Err(e) => {
                let _ = ready.send(Err(e));
                return;
            }
        };
        let _ = ready.send(Ok(()));

        // Keep the stream alive until shutdown or until the engine is dropped
        while let Ok(command) = commands.recv() {
            match command {
                OutputCommand::Shutdown => break,
            }
        }
        drop(stream);
        debug!("audio output thread exiting");
    }
}

impl PlaybackEngine for CpalEngine {
    fn create_handle(
        &self,
        audio: Arc<DecodedAudio>,
    ) -> lyre_playback::Result<Box<dyn PlaybackHandle>> {
        self.engine.create_handle(audio)
    }

    fn gain(&self) -> f32 {
        self.engine.gain()
    }

    fn set_gain(&self, gain: f32) {
        self.engine.set_gain(gain);
    }
}

impl Drop for CpalEngine {
    fn drop(&mut self) {
        let _ = self.command_tx.send(OutputCommand::Shutdown);
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

fn build_stream_for_format(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream> {
    match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(device, config, mixer),
        cpal::SampleFormat::I16 => build_stream::<i16>(device, config, mixer),
        cpal::SampleFormat::U16 => build_stream::<u16>(device, config, mixer),
        other => Err(AudioError::UnsupportedFormat(format!("{other:?}"))),
    }
}

/// Type-specialized stream builder; mixes in f32 and converts per sample
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: Arc<Mixer>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            scratch.resize(data.len(), 0.0);
            mixer.render(&mut scratch, channels);
            for (out, sample) in data.iter_mut().zip(&scratch) {
                *out = T::from_sample(*sample);
            }
        },
        |err| error!(error = %err, "audio stream error"),
        None,
    )?;
    Ok(stream)
}
