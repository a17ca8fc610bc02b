//! Voice tuning and pitch control.

use serde::Deserialize;

use crate::error::{DriftError, Result};

/// Upper bound on voices: one digit key per voice plus the merge key
pub const MAX_VOICES: usize = 8;

/// Lowest pitch a voice may reach at the bottom of the pitch range (Hz).
/// Bounds the wavetable period the audio callback has to allocate.
pub const MIN_FREQUENCY_HZ: f32 = 1.0;

/// Voice layout, left to right on screen and on the digit row
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VoiceParams {
    /// Base frequency of each voice (Hz)
    pub base_frequencies_hz: Vec<f32>,

    /// Pitch change per arrow key press (octaves)
    pub pitch_step_octaves: f32,

    /// Allowed pitch shift range (octaves)
    pub pitch_range_octaves: (f32, f32),
}

impl Default for VoiceParams {
    fn default() -> Self {
        Self {
            base_frequencies_hz: vec![110.0, 220.0, 330.0, 440.0],
            pitch_step_octaves: 0.1,
            pitch_range_octaves: (-4.0, 4.0),
        }
    }
}

impl VoiceParams {
    pub fn count(&self) -> usize {
        self.base_frequencies_hz.len()
    }

    pub fn validate(&self) -> Result<()> {
        let count = self.count();
        if count == 0 || count > MAX_VOICES {
            return Err(DriftError::config(format!(
                "Voice count must be within 1..={}, got {}",
                MAX_VOICES, count
            )));
        }
        if let Some(bad) = self
            .base_frequencies_hz
            .iter()
            .find(|f| !(f.is_finite() && **f > 0.0))
        {
            return Err(DriftError::config(format!(
                "Base frequencies must be positive, got {}",
                bad
            )));
        }
        let (lo, hi) = self.pitch_range_octaves;
        if !(lo.is_finite() && hi.is_finite() && lo <= 0.0 && hi >= 0.0) {
            return Err(DriftError::config(format!(
                "Pitch range must contain 0, got ({}, {})",
                lo, hi
            )));
        }
        if let Some(low) = self
            .base_frequencies_hz
            .iter()
            .map(|f| f * lo.exp2())
            .find(|f| *f < MIN_FREQUENCY_HZ)
        {
            return Err(DriftError::config(format!(
                "Lowest reachable pitch must be >= {} Hz, got {}",
                MIN_FREQUENCY_HZ, low
            )));
        }
        Ok(())
    }
}
