//! Whole-file decoding with Symphonia
//!
//! # Format Support
//!
//! - **Containers**: MP3, FLAC, OGG, WAV, AAC, M4A, etc. (Symphonia `all`)
//! - **Sample types**: F32, F64, S8, S16, S24, S32, U8, U16, U24, U32
//! - **Channel layouts**: mono is duplicated to stereo, multi-channel keeps
//!   the front pair
//!
//! Every packet of the default track is decoded up front into one interleaved
//! stereo `f32` buffer. When an output rate is configured the buffer is
//! resampled with rubato so the engine can play it without conversion.

use crate::error::{AudioError, Result};
use lyre_playback::{AudioDecoder, DecodedAudio, Locator};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::io::Cursor;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::{debug, warn};

/// Decoded buffers are always stereo
const OUTPUT_CHANNELS: u16 = 2;

/// Symphonia-based [`AudioDecoder`]
#[derive(Debug, Clone, Default)]
pub struct SymphoniaDecoder {
    output_rate: Option<u32>,
}

impl SymphoniaDecoder {
    /// Decoder that keeps each file's native sample rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Decoder that resamples everything to `rate`
    pub fn with_output_rate(rate: u32) -> Self {
        Self {
            output_rate: Some(rate),
        }
    }

    /// Configured output rate, if any
    pub fn output_rate(&self) -> Option<u32> {
        self.output_rate
    }

    /// Decode a complete file held in memory
    pub fn decode_bytes(&self, extension: Option<&str>, bytes: Vec<u8>) -> Result<DecodedAudio> {
        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )?;
        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| AudioError::Decode("No audio tracks found".into()))?;
        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let mut decoder =
            symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

        let mut samples = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e.into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => {
                    sample_rate = decoded.spec().rate;
                    samples.extend(convert_to_f32_interleaved(decoded));
                }
                // Corrupt packets are skipped, as players usually do
                Err(SymphoniaError::DecodeError(msg)) => {
                    warn!(error = msg, "skipping undecodable packet");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if samples.is_empty() {
            return Err(AudioError::Decode("stream contains no audio".into()));
        }

        let (samples, sample_rate) = match self.output_rate {
            Some(target) if target != sample_rate => {
                debug!(from = sample_rate, to = target, "resampling");
                (resample(&samples, sample_rate, target)?, target)
            }
            _ => (samples, sample_rate),
        };

        DecodedAudio::new(samples, sample_rate, OUTPUT_CHANNELS)
            .map_err(|e| AudioError::Decode(e.to_string()))
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, locator: &Locator, bytes: Vec<u8>) -> lyre_playback::Result<DecodedAudio> {
        let extension = locator.extension();
        let audio = self.decode_bytes(extension.as_deref(), bytes)?;
        debug!(
            %locator,
            frames = audio.frames(),
            rate = audio.sample_rate(),
            "decoded"
        );
        Ok(audio)
    }
}

/// Interleave a planar buffer to stereo f32 with a per-format normalization
fn interleave_to_stereo_f32<T, F>(buf: &AudioBuffer<T>, normalize: F) -> Vec<f32>
where
    T: Sample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    let left = buf.chan(0);
    let right = if channels > 1 { buf.chan(1) } else { left };

    let mut output = Vec::with_capacity(frames * 2);
    for (l, r) in left.iter().zip(right) {
        output.push(normalize(*l));
        output.push(normalize(*r));
    }
    output
}

/// Normalize any Symphonia sample format to interleaved stereo in `[-1, 1]`
fn convert_to_f32_interleaved(decoded: AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => interleave_to_stereo_f32(&buf, |s| s),
        AudioBufferRef::F64(buf) => interleave_to_stereo_f32(&buf, |s| s as f32),

        AudioBufferRef::S8(buf) => interleave_to_stereo_f32(&buf, |s| s as f32 / i8::MAX as f32),
        AudioBufferRef::S16(buf) => interleave_to_stereo_f32(&buf, |s| s as f32 / i16::MAX as f32),
        AudioBufferRef::S24(buf) => interleave_to_stereo_f32(&buf, |s| s.inner() as f32 / 8388607.0),
        AudioBufferRef::S32(buf) => interleave_to_stereo_f32(&buf, |s| s as f32 / i32::MAX as f32),

        AudioBufferRef::U8(buf) => {
            interleave_to_stereo_f32(&buf, |s| (s as f32 / u8::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U16(buf) => {
            interleave_to_stereo_f32(&buf, |s| (s as f32 / u16::MAX as f32) * 2.0 - 1.0)
        }
        AudioBufferRef::U24(buf) => {
            interleave_to_stereo_f32(&buf, |s| (s.inner() as f32 / 16777215.0) * 2.0 - 1.0)
        }
        AudioBufferRef::U32(buf) => {
            interleave_to_stereo_f32(&buf, |s| (s as f64 / u32::MAX as f64 * 2.0 - 1.0) as f32)
        }
    }
}

/// Resample an interleaved stereo buffer in one pass
pub(crate) fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    let channels = OUTPUT_CHANNELS as usize;
    let frames = samples.len() / channels;
    if frames == 0 {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler =
        SincFixedIn::<f32>::new(f64::from(to) / f64::from(from), 2.0, params, frames, channels)
            .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    let mut deinterleaved = vec![Vec::with_capacity(frames); channels];
    for frame in samples.chunks_exact(channels) {
        for (ch, channel) in deinterleaved.iter_mut().enumerate() {
            channel.push(frame[ch]);
        }
    }

    let resampled = resampler
        .process(&deinterleaved, None)
        .map_err(|e| AudioError::ResampleError(e.to_string()))?;

    let output_frames = resampled[0].len();
    let mut interleaved = Vec::with_capacity(output_frames * channels);
    for frame in 0..output_frames {
        for channel in &resampled {
            interleaved.push(channel[frame]);
        }
    }
    Ok(interleaved)
}
