//! Audio system managing device output, recording and analysis.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use super::fft::{spawn_fft_thread, SpectrumBands};
use crate::error::{DriftError, Result};
use crate::instrument::Instrument;
use crate::params::{FFTConfig, RecordingConfig};

type SharedWavWriter = Arc<Mutex<Option<hound::WavWriter<BufWriter<File>>>>>;

/// Names of all output devices on the default host
pub fn list_output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    Ok(host
        .output_devices()?
        .filter_map(|device| device.name().ok())
        .collect())
}

/// Default device, or the first whose name contains `name` (case-insensitive)
fn select_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    let Some(name) = name else {
        return host
            .default_output_device()
            .ok_or(DriftError::NoOutputDevice);
    };

    let wanted = name.to_lowercase();
    host.output_devices()?
        .find(|device| {
            device
                .name()
                .map(|n| n.to_lowercase().contains(&wanted))
                .unwrap_or(false)
        })
        .ok_or_else(|| DriftError::DeviceNotFound(name.to_string()))
}

/// State moved into the output callback
struct CallbackState {
    instrument: Arc<Mutex<Instrument>>,
    fft_buffer: Arc<Mutex<Vec<f32>>>,
    fft_capacity: usize,
    recorder: Option<SharedWavWriter>,
}

/// Audio system managing synthesis output and FFT analysis
pub struct AudioSystem {
    /// Latest spectrum summary (thread-safe)
    spectrum: Arc<Mutex<SpectrumBands>>,

    /// Audio output stream (kept alive, dropped first on shutdown)
    stream: Option<cpal::Stream>,

    /// Clears to stop the analysis thread
    running: Arc<AtomicBool>,

    fft_thread: Option<thread::JoinHandle<()>>,

    recorder: Option<SharedWavWriter>,

    sample_rate_hz: u32,
}

impl AudioSystem {
    /// Open the output device and start streaming `instrument`
    pub fn new(
        instrument: Arc<Mutex<Instrument>>,
        mut fft_config: FFTConfig,
        device_name: Option<&str>,
        recording: Option<&RecordingConfig>,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = select_device(&host, device_name)?;
        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let sample_rate_hz = config.sample_rate.0;

        tracing::info!(
            "Audio: {} @ {}Hz, {} channel(s), {:?}",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate_hz,
            config.channels,
            sample_format
        );

        instrument
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_sample_rate(sample_rate_hz as f32);

        // Analysis follows the device rate
        fft_config.sample_rate_hz = sample_rate_hz as usize;
        fft_config.validate()?;

        // Create WAV writer if recording
        let recorder = match recording {
            Some(recording) => {
                recording.ensure_dir()?;
                let spec = hound::WavSpec {
                    channels: 1,
                    sample_rate: sample_rate_hz,
                    bits_per_sample: 32,
                    sample_format: hound::SampleFormat::Float,
                };
                let path = recording.session_path();
                let writer = hound::WavWriter::create(&path, spec)?;
                tracing::info!("Recording to {}", path.display());
                Some(Arc::new(Mutex::new(Some(writer))))
            }
            None => None,
        };

        let fft_buffer = Arc::new(Mutex::new(Vec::<f32>::new()));
        let spectrum = Arc::new(Mutex::new(SpectrumBands::default()));
        let running = Arc::new(AtomicBool::new(true));

        let state = CallbackState {
            instrument,
            fft_buffer: Arc::clone(&fft_buffer),
            fft_capacity: fft_config.buffer_capacity(),
            recorder: recorder.clone(),
        };

        // Build audio output stream
        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, state)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, state)?,
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, state)?,
            other => {
                return Err(DriftError::Stream(format!(
                    "Unsupported sample format {:?}",
                    other
                )))
            }
        };
        stream.play()?;

        // Start FFT analysis thread
        let fft_thread = spawn_fft_thread(
            fft_config,
            fft_buffer,
            Arc::clone(&spectrum),
            Arc::clone(&running),
        );

        Ok(Self {
            spectrum,
            stream: Some(stream),
            running,
            fft_thread: Some(fft_thread),
            recorder,
            sample_rate_hz,
        })
    }

    /// Get the current spectrum summary (thread-safe)
    pub fn spectrum(&self) -> SpectrumBands {
        *self.spectrum.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        // Stop the callback before finalising anything it writes to
        drop(self.stream.take());

        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.fft_thread.take() {
            if handle.join().is_err() {
                tracing::warn!("Analysis thread panicked");
            }
        }

        if let Some(recorder) = self.recorder.take() {
            let writer = recorder
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(writer) = writer {
                match writer.finalize() {
                    Ok(()) => tracing::info!("Recording saved"),
                    Err(e) => tracing::error!("Failed to finalize recording: {}", e),
                }
            }
        }
    }
}

/// Append one block to the session recording.
///
/// The first write error closes the recording; later blocks are dropped
/// instead of failing once per sample.
fn write_recording<W: Write + Seek>(slot: &mut Option<hound::WavWriter<W>>, samples: &[f32]) {
    let Some(writer) = slot.as_mut() else {
        return;
    };
    if let Err(e) = samples.iter().try_for_each(|&s| writer.write_sample(s)) {
        tracing::error!("Recording stopped: {}", e);
        *slot = None;
    }
}

/// Build an output stream writing the mono mix to every channel
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    state: CallbackState,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let sample_rate = config.sample_rate.0 as f64;
    let CallbackState {
        instrument,
        fft_buffer,
        fft_capacity,
        recorder,
    } = state;

    let mut mono: Vec<f32> = Vec::new();
    let mut frames_rendered: u64 = 0;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / channels;
            mono.resize(frames, 0.0);

            // Stream time drives the entropy schedule
            let now_s = frames_rendered as f64 / sample_rate;
            instrument
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .render(&mut mono, now_s);
            frames_rendered += frames as u64;

            for (frame, &sample) in data.chunks_mut(channels).zip(mono.iter()) {
                let value = T::from_sample(sample);
                for out in frame.iter_mut() {
                    *out = value;
                }
            }

            // Accumulate for FFT analysis, keeping only the newest samples
            {
                let mut fft_buf = fft_buffer.lock().unwrap_or_else(PoisonError::into_inner);
                fft_buf.extend_from_slice(&mono);
                if fft_buf.len() > fft_capacity {
                    let excess = fft_buf.len() - fft_capacity;
                    fft_buf.drain(..excess);
                }
            }

            // Record to WAV if recording
            if let Some(ref recorder) = recorder {
                let mut guard = recorder.lock().unwrap_or_else(PoisonError::into_inner);
                write_recording(&mut *guard, &mono);
            }
        },
        |err| tracing::error!("Audio stream error: {}", err),
        None,
    )?;

    Ok(stream)
}
