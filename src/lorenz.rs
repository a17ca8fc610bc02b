//! Per-voice Lorenz integrator and the wavetable it shapes.
//!
//! Each voice ("circle") owns one Lorenz system. Periodically the trajectory
//! is summarised into three nodes (the means of x, y and z), which become a
//! stepped, smoothed and waveshaped single-cycle wavetable. An entropy value
//! ramps up with every update and pushes the system parameters further into
//! the chaotic regime, so a voice drifts the longer it is played.

use glam::DVec3;

use crate::params::{EntropyParams, LorenzParams, PulseParams};
use crate::pulse::{convolve_same, hanning, normalize_peak};

/// Offset added to the node peak before dividing
const NODE_EPSILON: f64 = 1e-6;

/// Any state component beyond this is treated as numerical blow-up.
/// The attractor itself stays within a few hundred units for sane parameters.
const DIVERGENCE_LIMIT: f64 = 1e6;

/// One chaotic oscillator and its current wavetable
#[derive(Debug, Clone)]
pub struct LorenzCircle {
    state: DVec3,
    sigma: f64,
    rho: f64,
    beta: f64,
    entropy: f64,
    pulse: Vec<f32>,
    /// Incremented whenever `pulse` changes
    revision: u64,
    last_update_s: f64,

    lorenz: LorenzParams,
    drift: EntropyParams,
    shape: PulseParams,
    kernel: Vec<f32>,
}

impl LorenzCircle {
    /// Create a circle at zero entropy with its first pulse already built
    pub fn new(lorenz: LorenzParams, drift: EntropyParams, shape: PulseParams) -> Self {
        let mut circle = Self {
            state: DVec3::from_array(lorenz.initial_state),
            sigma: lorenz.sigma,
            rho: lorenz.rho,
            beta: lorenz.beta,
            entropy: 0.0,
            pulse: vec![0.0; shape.length],
            revision: 0,
            last_update_s: 0.0,
            kernel: hanning(shape.smoothing_taps),
            lorenz,
            drift,
            shape,
        };
        circle.build_pulse();
        circle
    }

    pub fn state(&self) -> DVec3 {
        self.state
    }

    /// Current (σ, ρ, β)
    pub fn parameters(&self) -> (f64, f64, f64) {
        (self.sigma, self.rho, self.beta)
    }

    pub fn entropy(&self) -> f64 {
        self.entropy
    }

    pub fn pulse(&self) -> &[f32] {
        &self.pulse
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Advance one forward-Euler step
    pub fn step(&mut self, dt: f64) {
        let DVec3 { x, y, z } = self.state;
        let derivative = DVec3::new(
            self.sigma * (y - x),
            x * (self.rho - z) - y,
            x * y - self.beta * z,
        );
        self.state += derivative * dt;

        if !self.state.is_finite() || self.state.abs().max_element() > DIVERGENCE_LIMIT {
            tracing::warn!(
                entropy = self.entropy,
                "Lorenz state diverged, restarting from initial state"
            );
            self.state = DVec3::from_array(self.lorenz.initial_state);
        }
    }

    /// Raise entropy by one step and re-derive σ, ρ, β from it
    pub fn update_entropy(&mut self) {
        self.entropy = (self.entropy + self.drift.step).min(1.0);

        self.sigma = self.lorenz.sigma + self.drift.sigma_gain * self.entropy;
        self.rho = self.lorenz.rho + self.drift.rho_gain * self.entropy;
        self.beta = self.lorenz.beta + self.drift.beta_gain * self.entropy;
    }

    /// Integrate the configured number of steps and return the mean state
    pub fn trajectory_means(&mut self) -> DVec3 {
        let steps = self.lorenz.steps;
        let dt = self.lorenz.dt;
        let mut sum = DVec3::ZERO;
        for _ in 0..steps {
            self.step(dt);
            sum += self.state;
        }
        sum / steps as f64
    }

    /// Rebuild the wavetable from a fresh stretch of trajectory
    pub fn build_pulse(&mut self) {
        let means = self.trajectory_means();

        // bottom, centre, crest
        let mut nodes = means.to_array();
        let centre = nodes.iter().sum::<f64>() / 3.0;
        for node in nodes.iter_mut() {
            *node -= centre;
        }
        let node_peak = nodes.iter().fold(0.0f64, |acc, n| acc.max(n.abs())) + NODE_EPSILON;
        for node in nodes.iter_mut() {
            *node /= node_peak;
        }

        let len = self.shape.length;
        let third = len / 3;
        let stepped: Vec<f32> = (0..len)
            .map(|i| {
                let segment = (i / third).min(2);
                nodes[segment] as f32
            })
            .collect();

        let mut pulse = convolve_same(&stepped, &self.kernel);

        let drive = self.entropy as f32 * self.shape.waveshape_gain;
        for p in pulse.iter_mut() {
            *p += drive * p.powi(3);
        }
        normalize_peak(&mut pulse);

        self.set_pulse(pulse);
    }

    /// Apply a scheduled entropy update if the interval has elapsed.
    ///
    /// Returns true when the pulse was rebuilt.
    pub fn maybe_update(&mut self, now_s: f64) -> bool {
        if now_s - self.last_update_s > self.drift.update_interval_s {
            self.update_entropy();
            self.build_pulse();
            self.last_update_s = now_s;
            true
        } else {
            false
        }
    }

    /// Replace the wavetable (lengths other than the configured one are ignored)
    pub fn set_pulse(&mut self, pulse: Vec<f32>) {
        if pulse.len() != self.shape.length {
            tracing::debug!(
                expected = self.shape.length,
                got = pulse.len(),
                "Ignoring pulse of wrong length"
            );
            return;
        }
        self.pulse = pulse;
        self.revision = self.revision.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pulse::peak;

    fn circle() -> LorenzCircle {
        LorenzCircle::new(
            LorenzParams::default(),
            EntropyParams::default(),
            PulseParams::default(),
        )
    }

    fn fresh_state_circle() -> LorenzCircle {
        let mut c = circle();
        c.state = DVec3::new(0.1, 0.0, 0.0);
        c
    }

    #[test]
    fn test_euler_step() {
        let mut c = fresh_state_circle();
        c.step(0.005);

        // dx = 10·(0 - 0.1), dy = 0.1·28, dz = 0
        let s = c.state();
        assert!((s.x - 0.095).abs() < 1e-12);
        assert!((s.y - 0.014).abs() < 1e-12);
        assert!(s.z.abs() < 1e-12);
    }

    #[test]
    fn test_entropy_saturates() {
        let mut c = circle();
        c.update_entropy();
        assert!((c.entropy() - 0.02).abs() < 1e-12);

        for _ in 0..60 {
            c.update_entropy();
        }
        assert_eq!(c.entropy(), 1.0);

        let (sigma, rho, beta) = c.parameters();
        assert!((sigma - 16.0).abs() < 1e-9);
        assert!((rho - 48.0).abs() < 1e-9);
        assert!((beta - (8.0 / 3.0 + 2.5)).abs() < 1e-9);
    }

    #[test]
    fn test_pulse_is_normalised() {
        let c = circle();
        assert_eq!(c.pulse().len(), 512);
        let p = peak(c.pulse());
        assert!(p <= 1.0);
        assert!(p > 0.99, "pulse should be near full scale, peak {}", p);
    }

    #[test]
    fn test_pulse_is_piecewise_smooth() {
        let c = circle();
        // Away from the segment boundaries the stepped shape is flat
        let p = c.pulse();
        assert!((p[80] - p[90]).abs() < 1e-5);
        assert!((p[250] - p[260]).abs() < 1e-5);
    }

    #[test]
    fn test_maybe_update_respects_interval() {
        let mut c = circle();
        let rev = c.revision();

        assert!(!c.maybe_update(1.0));
        assert!(!c.maybe_update(2.0));
        assert_eq!(c.entropy(), 0.0);

        assert!(c.maybe_update(2.5));
        assert!(c.entropy() > 0.0);
        assert!(c.revision() > rev);

        // Next update counts from 2.5s
        assert!(!c.maybe_update(4.0));
        assert!(c.maybe_update(4.6));
    }

    #[test]
    fn test_divergence_resets_state() {
        let lorenz = LorenzParams {
            dt: 1.0,
            ..LorenzParams::default()
        };
        let mut c = LorenzCircle::new(lorenz, EntropyParams::default(), PulseParams::default());
        for _ in 0..1000 {
            c.step(1.0);
            assert!(c.state().is_finite());
        }
        assert!(c.pulse().iter().all(|x| x.is_finite()));
    }

    #[test]
    fn test_set_pulse_rejects_wrong_length() {
        let mut c = circle();
        let before = c.pulse().to_vec();
        c.set_pulse(vec![0.5; 10]);
        assert_eq!(c.pulse(), before.as_slice());
    }
}
