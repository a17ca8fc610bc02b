//! Lorenz integrator, entropy drift and wavetable shaping parameters.

use serde::Deserialize;

use crate::error::{DriftError, Result};

/// Lorenz system parameters at zero entropy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LorenzParams {
    /// Initial (x, y, z) state, also used when the integrator is reset
    pub initial_state: [f64; 3],

    /// Prandtl number σ
    pub sigma: f64,

    /// Rayleigh number ρ
    pub rho: f64,

    /// Geometric factor β
    pub beta: f64,

    /// Euler integration step (simulation time units)
    pub dt: f64,

    /// Integration steps summarised into one pulse
    pub steps: usize,
}

impl Default for LorenzParams {
    fn default() -> Self {
        Self {
            initial_state: [0.1, 0.0, 0.0],
            sigma: 10.0,
            rho: 28.0,
            beta: 8.0 / 3.0,
            dt: 0.005,
            steps: 400,
        }
    }
}

impl LorenzParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(DriftError::config(format!(
                "Lorenz dt must be > 0, got {}",
                self.dt
            )));
        }
        if self.steps == 0 {
            return Err(DriftError::config("Lorenz steps must be > 0"));
        }
        if self.initial_state.iter().any(|v| !v.is_finite()) {
            return Err(DriftError::config("Lorenz initial state must be finite"));
        }
        Ok(())
    }
}

/// Per-voice entropy drift
///
/// Each update: `entropy = min(entropy + step, 1)`, then
/// `σ = σ0 + sigma_gain·e`, `ρ = ρ0 + rho_gain·e`, `β = β0 + beta_gain·e`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntropyParams {
    /// Entropy increment per update (dimensionless, 0..1]
    pub step: f64,

    /// Seconds between entropy updates / pulse rebuilds of a sounding voice
    pub update_interval_s: f64,

    pub sigma_gain: f64,
    pub rho_gain: f64,
    pub beta_gain: f64,
}

impl Default for EntropyParams {
    fn default() -> Self {
        Self {
            step: 0.02,
            update_interval_s: 2.0,
            sigma_gain: 6.0,
            rho_gain: 20.0,
            beta_gain: 2.5,
        }
    }
}

impl EntropyParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.step > 0.0 && self.step <= 1.0) {
            return Err(DriftError::config(format!(
                "Entropy step must be in (0, 1], got {}",
                self.step
            )));
        }
        if !(self.update_interval_s.is_finite() && self.update_interval_s > 0.0) {
            return Err(DriftError::config("Entropy update interval must be > 0"));
        }
        Ok(())
    }
}

/// Wavetable ("pulse") construction
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PulseParams {
    /// Wavetable length (samples)
    pub length: usize,

    /// Hann smoothing kernel length (taps, odd)
    pub smoothing_taps: usize,

    /// Cubic waveshaping amount at entropy 1: `p += e·gain·p³`
    pub waveshape_gain: f32,
}

impl Default for PulseParams {
    fn default() -> Self {
        Self {
            length: 512,
            smoothing_taps: 21,
            waveshape_gain: 0.4,
        }
    }
}

impl PulseParams {
    pub fn validate(&self) -> Result<()> {
        if self.length < 3 {
            return Err(DriftError::config(format!(
                "Pulse length must be >= 3, got {}",
                self.length
            )));
        }
        if self.smoothing_taps == 0
            || self.smoothing_taps % 2 == 0
            || self.smoothing_taps > self.length
        {
            return Err(DriftError::config(format!(
                "Smoothing taps must be odd and within 1..={}, got {}",
                self.length, self.smoothing_taps
            )));
        }
        Ok(())
    }
}
