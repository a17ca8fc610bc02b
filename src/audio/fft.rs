//! FFT analysis thread and utilities.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::params::FFTConfig;
use crate::pulse::hanning;

/// Longest uninterrupted sleep of the analysis thread
const STOP_POLL: Duration = Duration::from_millis(10);

/// Spectrum summary of the most recent analysis window
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpectrumBands {
    pub low: f32,  // Bass (20-200 Hz)
    pub mid: f32,  // Mids (200-1000 Hz)
    pub high: f32, // Highs (1000-4000 Hz)
    /// Normalised spectral entropy, 0 (pure tone or silence) to 1 (flat)
    pub entropy: f32,
}

/// Windowed FFT over a fixed-size block
pub struct Analyzer {
    config: FFTConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
}

impl Analyzer {
    pub fn new(config: FFTConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.fft_size);
        let window = hanning(config.fft_size);
        let buffer = vec![Complex::new(0.0, 0.0); config.fft_size];
        Self {
            config,
            fft,
            window,
            buffer,
        }
    }

    /// Analyse the first `fft_size` samples (zero padded if shorter)
    pub fn analyze(&mut self, samples: &[f32]) -> SpectrumBands {
        // Apply Hann window
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process(&mut self.buffer);

        // Magnitudes of the positive-frequency half, scaled so bands are
        // comparable across FFT sizes
        let half = self.config.fft_size / 2;
        let scale = 1.0 / half as f32;
        let magnitudes: Vec<f32> = self.buffer[..half]
            .iter()
            .map(|c| c.norm() * scale)
            .collect();

        let power: Vec<f32> = magnitudes[1..].iter().map(|m| m * m).collect();

        SpectrumBands {
            low: band_mean(&magnitudes, self.config.bass_bins()),
            mid: band_mean(&magnitudes, self.config.mid_bins()),
            high: band_mean(&magnitudes, self.config.high_bins()),
            entropy: spectral_entropy(&power),
        }
    }
}

fn band_mean(magnitudes: &[f32], bins: Range<usize>) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let len = bins.len();
    magnitudes[bins].iter().sum::<f32>() / len as f32
}

/// Shannon entropy of a power spectrum, normalised by `ln(bins)`
pub fn spectral_entropy(power: &[f32]) -> f32 {
    let total: f32 = power.iter().sum();
    if power.len() < 2 || total <= 1e-12 {
        return 0.0;
    }
    let h: f32 = power
        .iter()
        .filter(|p| **p > 0.0)
        .map(|p| {
            let prob = p / total;
            -prob * prob.ln()
        })
        .sum();
    (h / (power.len() as f32).ln()).clamp(0.0, 1.0)
}

/// Spawn FFT analysis thread
///
/// Runs until `running` is cleared. Each tick consumes one window with 50%
/// overlap from `fft_buffer` and publishes the result to `bands`.
pub fn spawn_fft_thread(
    config: FFTConfig,
    fft_buffer: Arc<Mutex<Vec<f32>>>,
    bands: Arc<Mutex<SpectrumBands>>,
    running: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut analyzer = Analyzer::new(config.clone());
        let mut window = Vec::with_capacity(config.fft_size);

        let interval = Duration::from_millis(config.update_interval_ms);
        while sleep_while_running(interval, &running) {
            {
                let mut fft_buf = fft_buffer.lock().unwrap_or_else(PoisonError::into_inner);
                if fft_buf.len() < config.fft_size {
                    continue;
                }
                window.clear();
                window.extend_from_slice(&fft_buf[..config.fft_size]);

                // 50% overlap (drain half the buffer)
                fft_buf.drain(0..config.fft_size / 2);
            }

            let result = analyzer.analyze(&window);
            *bands.lock().unwrap_or_else(PoisonError::into_inner) = result;
        }
        tracing::debug!("Analysis thread stopped");
    })
}

/// Sleep for `interval` in short slices. Returns false once `running` clears.
fn sleep_while_running(interval: Duration, running: &AtomicBool) -> bool {
    let deadline = Instant::now() + interval;
    loop {
        if !running.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(STOP_POLL));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f32::consts::PI;

    fn sine(freq_hz: f32, config: &FFTConfig) -> Vec<f32> {
        (0..config.fft_size)
            .map(|i| (2.0 * PI * freq_hz * i as f32 / config.sample_rate_hz as f32).sin())
            .collect()
    }

    #[test]
    fn test_analyzer_uses_hann_window() {
        let config = FFTConfig::default();
        let size = config.fft_size;
        let analyzer = Analyzer::new(config);

        // Hann window should be 0 at edges, 1 at center
        assert_eq!(analyzer.window, hanning(size));
        assert!(analyzer.window[0].abs() < 0.01);
        assert!(analyzer.window[size - 1].abs() < 0.01);
        assert!((analyzer.window[size / 2] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_smallest_fft_size_analyzes() {
        let config = FFTConfig {
            fft_size: crate::params::MIN_FFT_SIZE,
            ..FFTConfig::default()
        };
        assert!(config.validate().is_ok());
        let mut analyzer = Analyzer::new(config);
        let bands = analyzer.analyze(&[0.5, -0.5, 0.25]);
        assert!(bands.entropy.is_finite());
        assert!(analyzer.window.iter().all(|w| w.is_finite()));
    }

    #[test]
    fn test_silence_has_no_energy() {
        let config = FFTConfig::default();
        let mut analyzer = Analyzer::new(config.clone());
        let bands = analyzer.analyze(&vec![0.0; config.fft_size]);
        assert_eq!(bands, SpectrumBands::default());
    }

    #[test]
    fn test_bass_tone_lands_in_low_band() {
        let config = FFTConfig::default();
        let mut analyzer = Analyzer::new(config.clone());
        let bands = analyzer.analyze(&sine(110.0, &config));
        assert!(bands.low > bands.mid);
        assert!(bands.low > bands.high);
    }

    #[test]
    fn test_tone_has_low_entropy_noise_high() {
        let config = FFTConfig::default();
        let mut analyzer = Analyzer::new(config.clone());

        // Centred on bin 20
        let bin_hz = config.sample_rate_hz as f32 / config.fft_size as f32;
        let tone = analyzer.analyze(&sine(20.0 * bin_hz, &config));
        assert!(tone.entropy < 0.3, "tone entropy {}", tone.entropy);

        let mut rng = StdRng::seed_from_u64(42);
        let noise: Vec<f32> = (0..config.fft_size)
            .map(|_| rng.gen_range(-1.0..1.0))
            .collect();
        let noisy = analyzer.analyze(&noise);
        assert!(noisy.entropy > 0.8, "noise entropy {}", noisy.entropy);
    }

    #[test]
    fn test_spectral_entropy_bounds() {
        assert_eq!(spectral_entropy(&[]), 0.0);
        assert_eq!(spectral_entropy(&[0.0; 8]), 0.0);
        assert_eq!(spectral_entropy(&[0.0, 5.0, 0.0, 0.0]), 0.0);
        assert!((spectral_entropy(&[1.0; 8]) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_thread_publishes_and_stops() {
        let config = FFTConfig {
            update_interval_ms: 1,
            ..FFTConfig::default()
        };
        let buffer = Arc::new(Mutex::new(sine(440.0, &config)));
        let bands = Arc::new(Mutex::new(SpectrumBands::default()));
        let running = Arc::new(AtomicBool::new(true));

        let handle = spawn_fft_thread(
            config.clone(),
            Arc::clone(&buffer),
            Arc::clone(&bands),
            Arc::clone(&running),
        );

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while buffer.lock().unwrap().len() == config.fft_size
            && std::time::Instant::now() < deadline
        {
            thread::sleep(Duration::from_millis(1));
        }
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();

        assert_eq!(buffer.lock().unwrap().len(), config.fft_size / 2);
        assert!(bands.lock().unwrap().mid > 0.0);
    }

    #[test]
    fn test_slow_thread_stops_promptly() {
        let config = FFTConfig {
            update_interval_ms: crate::params::MAX_UPDATE_INTERVAL_MS,
            ..FFTConfig::default()
        };
        let running = Arc::new(AtomicBool::new(true));
        let handle = spawn_fft_thread(
            config,
            Arc::new(Mutex::new(Vec::new())),
            Arc::new(Mutex::new(SpectrumBands::default())),
            Arc::clone(&running),
        );

        thread::sleep(Duration::from_millis(20));
        let stop = Instant::now();
        running.store(false, Ordering::Relaxed);
        handle.join().unwrap();
        assert!(stop.elapsed() < Duration::from_millis(500));
    }
}
