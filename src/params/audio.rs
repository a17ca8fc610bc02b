//! Audio output and analysis configuration.

use serde::Deserialize;
use std::ops::Range;

use crate::error::{DriftError, Result};

/// Output stage parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioParams {
    /// Sample rate used for offline rendering (Hz).
    /// Live playback uses the device's default rate instead.
    pub sample_rate_hz: u32,

    /// Gain applied to the averaged voice mix (dimensionless)
    pub master_gain: f32,

    /// Safety limiter: output is hard clipped to ±limit
    pub limit: f32,

    /// Shortest allowed wavetable period (samples); caps the highest pitch
    pub min_cycle_samples: usize,
}

impl Default for AudioParams {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44100,
            master_gain: 0.5,
            limit: 0.5,
            min_cycle_samples: 16,
        }
    }
}

impl AudioParams {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz == 0 {
            return Err(DriftError::config("Sample rate must be > 0"));
        }
        if !(self.master_gain.is_finite() && self.master_gain >= 0.0) {
            return Err(DriftError::config(format!(
                "Master gain must be finite and >= 0, got {}",
                self.master_gain
            )));
        }
        if !(self.limit > 0.0 && self.limit <= 1.0) {
            return Err(DriftError::config(format!(
                "Limiter must be in (0, 1], got {}",
                self.limit
            )));
        }
        if self.min_cycle_samples < 2 {
            return Err(DriftError::config("Minimum cycle length must be >= 2"));
        }
        Ok(())
    }
}

/// Smallest FFT that still leaves a usable positive-frequency half
pub const MIN_FFT_SIZE: usize = 16;

/// Longest analysis interval (ms); also bounds how long shutdown waits
pub const MAX_UPDATE_INTERVAL_MS: u64 = 1000;

/// FFT analysis configuration with frequency band mappings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FFTConfig {
    /// Audio sample rate (Hz), overwritten with the device rate at startup
    pub sample_rate_hz: usize,

    /// FFT window size (power of 2, at least `MIN_FFT_SIZE`)
    pub fft_size: usize,

    /// FFT update interval (milliseconds)
    /// 50 = 20 Hz update rate, matching the display refresh of the circles
    pub update_interval_ms: u64,

    /// Bass frequency range (Hz)
    pub bass_range_hz: (f32, f32),

    /// Mid frequency range (Hz)
    pub mid_range_hz: (f32, f32),

    /// High frequency range (Hz)
    pub high_range_hz: (f32, f32),
}

impl Default for FFTConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44100,
            fft_size: 1024,
            update_interval_ms: 50,
            bass_range_hz: (20.0, 200.0),
            mid_range_hz: (200.0, 1000.0),
            high_range_hz: (1000.0, 4000.0),
        }
    }
}

impl FFTConfig {
    /// Convert frequency (Hz) to FFT bin index
    pub fn hz_to_bin(&self, hz: f32) -> usize {
        ((hz * self.fft_size as f32) / self.sample_rate_hz as f32) as usize
    }

    /// Get FFT bin range for bass frequencies
    pub fn bass_bins(&self) -> Range<usize> {
        self.band_bins(self.bass_range_hz)
    }

    /// Get FFT bin range for mid frequencies
    pub fn mid_bins(&self) -> Range<usize> {
        self.band_bins(self.mid_range_hz)
    }

    /// Get FFT bin range for high frequencies
    pub fn high_bins(&self) -> Range<usize> {
        self.band_bins(self.high_range_hz)
    }

    /// Bin range clamped to the positive-frequency half of the spectrum
    fn band_bins(&self, (lo, hi): (f32, f32)) -> Range<usize> {
        let nyquist = self.fft_size / 2;
        let start = self.hz_to_bin(lo).min(nyquist);
        let end = self.hz_to_bin(hi).min(nyquist).max(start);
        start..end
    }

    /// Maximum number of buffered samples awaiting analysis
    pub fn buffer_capacity(&self) -> usize {
        self.fft_size * 4
    }

    /// Validate configuration (FFT size must be power of 2, etc.)
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() {
            return Err(DriftError::config(format!(
                "FFT size must be power of 2, got {}",
                self.fft_size
            )));
        }
        if self.fft_size < MIN_FFT_SIZE {
            return Err(DriftError::config(format!(
                "FFT size must be >= {}, got {}",
                MIN_FFT_SIZE, self.fft_size
            )));
        }
        if self.sample_rate_hz == 0 {
            return Err(DriftError::config("Sample rate must be > 0"));
        }
        if self.update_interval_ms == 0 || self.update_interval_ms > MAX_UPDATE_INTERVAL_MS {
            return Err(DriftError::config(format!(
                "FFT update interval must be in 1..={} ms, got {}",
                MAX_UPDATE_INTERVAL_MS, self.update_interval_ms
            )));
        }
        Ok(())
    }
}

/// Audio constants
pub mod audio_constants {
    /// Block size used by the offline renderer (samples per buffer)
    /// 256 = 5.8ms @ 44.1kHz
    pub const BLOCK_SIZE: usize = 256;
}
