//! Wavetable helpers: smoothing, normalisation and cycle resampling.
//!
//! A "pulse" is one period of a voice's waveform. The instrument is tuned
//! for an unnormalised Hann kernel, "same"-mode convolution and clamped
//! linear interpolation; changing any of these changes the timbre.

use std::f32::consts::PI;

/// Offset added to peak values before dividing
const PEAK_EPSILON: f32 = 1e-6;

/// Hann window of `m` taps: `0.5 - 0.5·cos(2πn/(m-1))`, not normalised
pub fn hanning(m: usize) -> Vec<f32> {
    match m {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..m)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / (m - 1) as f32).cos())
            .collect(),
    }
}

/// Discrete convolution trimmed to the signal length, centred on the full result
pub fn convolve_same(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    let n = signal.len();
    let m = kernel.len();
    if m == 0 {
        return vec![0.0; n];
    }
    let offset = (m - 1) / 2;

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter_map(|(k, w)| {
                    (i + offset)
                        .checked_sub(k)
                        .filter(|&j| j < n)
                        .map(|j| w * signal[j])
                })
                .sum::<f32>()
        })
        .collect()
}

/// Largest absolute sample value
pub fn peak(buf: &[f32]) -> f32 {
    buf.iter().fold(0.0f32, |acc, x| acc.max(x.abs()))
}

/// Scale so the peak sits just below 1
pub fn normalize_peak(buf: &mut [f32]) {
    let scale = peak(buf) + PEAK_EPSILON;
    for x in buf.iter_mut() {
        *x /= scale;
    }
}

/// Resample one period to `n` samples.
///
/// Sample `k` reads position `k·len/n`; positions past the last index hold
/// the last value.
pub fn resample_cycle(pulse: &[f32], n: usize) -> Vec<f32> {
    let len = pulse.len();
    if len == 0 {
        return vec![0.0; n];
    }
    let last = (len - 1) as f32;

    (0..n)
        .map(|k| {
            let x = k as f32 * len as f32 / n as f32;
            if x >= last {
                return pulse[len - 1];
            }
            let i = x.floor() as usize;
            let frac = x - i as f32;
            pulse[i] + (pulse[i + 1] - pulse[i]) * frac
        })
        .collect()
}

/// Integer period (samples) for a frequency, never shorter than `min_samples`
pub fn samples_per_cycle(sample_rate_hz: f32, frequency_hz: f32, min_samples: usize) -> usize {
    let period = (sample_rate_hz / frequency_hz) as usize;
    period.max(min_samples).max(1)
}

/// Element-wise mean of equally long pulses
pub fn mean_pulse(pulses: &[&[f32]]) -> Vec<f32> {
    let Some(first) = pulses.first() else {
        return Vec::new();
    };
    let mut out = vec![0.0; first.len()];
    for pulse in pulses {
        for (acc, x) in out.iter_mut().zip(pulse.iter()) {
            *acc += x;
        }
    }
    let count = pulses.len() as f32;
    for x in out.iter_mut() {
        *x /= count;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &[f32], b: &[f32]) {
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b) {
            assert!((x - y).abs() < 1e-5, "{:?} != {:?}", a, b);
        }
    }

    #[test]
    fn test_hanning_shape() {
        let w = hanning(21);
        assert_eq!(w.len(), 21);
        assert!(w[0].abs() < 1e-6);
        assert!(w[20].abs() < 1e-6);
        assert!((w[10] - 1.0).abs() < 1e-6);
        for i in 0..10 {
            assert!((w[i] - w[20 - i]).abs() < 1e-6);
        }
        // Unnormalised: taps sum to (m-1)/2
        assert!((w.iter().sum::<f32>() - 10.0).abs() < 1e-4);
        assert_eq!(hanning(1), vec![1.0]);
    }

    #[test]
    fn test_convolve_same_centres_result() {
        // Full convolution is [0, 1, 2.5, 4, 1.5]; the centred slice keeps 3
        let out = convolve_same(&[1.0, 2.0, 3.0], &[0.0, 1.0, 0.5]);
        assert_close(&out, &[1.0, 2.5, 4.0]);
    }

    #[test]
    fn test_convolve_same_identity_kernel() {
        let signal = [0.3, -0.2, 0.9, 0.1, -0.7];
        let out = convolve_same(&signal, &[0.0, 0.0, 1.0, 0.0, 0.0]);
        assert_close(&out, &signal);
    }

    #[test]
    fn test_normalize_peak() {
        let mut buf = vec![0.5, -2.0, 1.0];
        normalize_peak(&mut buf);
        assert!((peak(&buf) - 1.0).abs() < 1e-5);
        assert!(peak(&buf) < 1.0);

        let mut silent = vec![0.0; 4];
        normalize_peak(&mut silent);
        assert!(silent.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_resample_cycle_interpolates_and_clamps() {
        let out = resample_cycle(&[0.0, 1.0, 2.0, 3.0], 8);
        assert_close(&out, &[0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.0]);

        let down = resample_cycle(&[0.0, 1.0, 2.0, 3.0], 2);
        assert_close(&down, &[0.0, 2.0]);
    }

    #[test]
    fn test_samples_per_cycle_floor() {
        assert_eq!(samples_per_cycle(44100.0, 440.0, 16), 100);
        assert_eq!(samples_per_cycle(44100.0, 110.0, 16), 400);
        // Very high pitches are capped by the minimum period
        assert_eq!(samples_per_cycle(44100.0, 10000.0, 16), 16);
    }

    #[test]
    fn test_mean_pulse() {
        let a = [1.0, 0.0, -1.0];
        let b = [0.0, 1.0, 1.0];
        assert_close(&mean_pulse(&[&a, &b]), &[0.5, 0.5, 0.0]);
        assert!(mean_pulse(&[]).is_empty());
    }
}
