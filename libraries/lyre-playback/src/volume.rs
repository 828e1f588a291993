//! Output gain policy: clamping and mute snapshots
//!
//! The gain value itself lives in the engine's shared output stage. This type
//! only remembers what is needed to undo a mute.

use crate::error::{PlaybackError, Result};

/// Mute state and gain bounds
#[derive(Debug, Clone)]
pub struct Volume {
    /// Upper bound for the linear gain
    max_gain: f32,

    /// Whether the output is muted
    muted: bool,

    /// Gain captured at the moment of muting
    pre_mute_gain: f32,
}

impl Volume {
    /// Create a volume policy with the given upper bound
    pub fn new(max_gain: f32) -> Self {
        Self {
            max_gain,
            muted: false,
            pre_mute_gain: max_gain,
        }
    }

    /// Clamp a requested gain into `[0, max_gain]`
    ///
    /// NaN and infinities are rejected rather than clamped.
    pub fn clamp(&self, gain: f32) -> Result<f32> {
        if !gain.is_finite() {
            return Err(PlaybackError::InvalidVolume(gain));
        }
        Ok(gain.clamp(0.0, self.max_gain))
    }

    /// Enter the muted state, remembering `current_gain`
    pub fn mute(&mut self, current_gain: f32) {
        self.pre_mute_gain = current_gain;
        self.muted = true;
    }

    /// Leave the muted state, returning the gain to restore
    pub fn unmute(&mut self) -> f32 {
        self.muted = false;
        self.pre_mute_gain
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Upper bound for the gain
    pub fn max_gain(&self) -> f32 {
        self.max_gain
    }

    /// Convert linear gain to dB
    ///
    /// Useful for logging and display; silence is reported as -60 dB.
    pub fn to_db(gain: f32) -> f32 {
        if gain <= 0.001 {
            -60.0
        } else {
            20.0 * gain.log10()
        }
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(1.0)
    }
}
