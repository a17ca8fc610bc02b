//! Voices, controls and the block renderer shared with the audio callback.
//!
//! The output is the Fourier sum of the active voices: each voice repeats
//! its wavetable at an integer period, and the periods are summed and
//! averaged into one mono signal.

use std::collections::BTreeSet;

use crate::config::InstrumentConfig;
use crate::lorenz::LorenzCircle;
use crate::params::{AudioParams, VoiceParams};
use crate::pulse::{mean_pulse, resample_cycle, samples_per_cycle};

/// One sounding position: an oscillator plus its playback state
#[derive(Debug, Clone)]
struct Voice {
    circle: LorenzCircle,
    base_hz: f32,
    /// Wavetable resampled to `period` samples
    cycle: Vec<f32>,
    /// Pulse revision `cycle` was built from
    cycle_revision: Option<u64>,
    period: usize,
    phase: usize,
}

impl Voice {
    fn new(circle: LorenzCircle, base_hz: f32) -> Self {
        Self {
            circle,
            base_hz,
            cycle: Vec::new(),
            cycle_revision: None,
            period: 0,
            phase: 0,
        }
    }

    /// Resample the wavetable if the pulse or the period changed
    fn refresh_cycle(&mut self, period: usize) {
        let revision = self.circle.revision();
        if period == self.period && self.cycle_revision == Some(revision) {
            return;
        }
        if self.period > 0 && period != self.period {
            // keep the relative position within the cycle across pitch changes
            self.phase = self.phase * period / self.period;
        }
        self.cycle = resample_cycle(self.circle.pulse(), period);
        self.cycle_revision = Some(revision);
        self.period = period;
        self.phase %= period;
    }
}

/// What the display needs to know about one voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceView {
    pub active: bool,
    pub entropy: f32,
    pub frequency_hz: f32,
}

/// Point-in-time view of the instrument for the UI thread
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentSnapshot {
    pub voices: Vec<VoiceView>,
    pub pitch_shift: f32,
}

/// The playable instrument
#[derive(Debug, Clone)]
pub struct Instrument {
    voices: Vec<Voice>,
    /// Indices of sounding voices, ordered left to right
    active: BTreeSet<usize>,
    /// Transposition applied to every voice (octaves)
    pitch_shift: f32,
    sample_rate_hz: f32,
    audio: AudioParams,
    tuning: VoiceParams,
}

impl Instrument {
    pub fn new(config: &InstrumentConfig, sample_rate_hz: f32) -> Self {
        let voices = config
            .voices
            .base_frequencies_hz
            .iter()
            .map(|&base_hz| {
                let circle = LorenzCircle::new(
                    config.lorenz.clone(),
                    config.entropy.clone(),
                    config.pulse.clone(),
                );
                Voice::new(circle, base_hz)
            })
            .collect();

        Self {
            voices,
            active: BTreeSet::new(),
            pitch_shift: 0.0,
            sample_rate_hz,
            audio: config.audio.clone(),
            tuning: config.voices.clone(),
        }
    }

    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    pub fn sample_rate_hz(&self) -> f32 {
        self.sample_rate_hz
    }

    /// Switch to the output device's rate; cycles are rebuilt on the next block
    pub fn set_sample_rate(&mut self, sample_rate_hz: f32) {
        self.sample_rate_hz = sample_rate_hz;
    }

    pub fn is_active(&self, voice: usize) -> bool {
        self.active.contains(&voice)
    }

    pub fn active_voices(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.iter().copied()
    }

    pub fn pitch_shift(&self) -> f32 {
        self.pitch_shift
    }

    pub fn entropy(&self, voice: usize) -> Option<f64> {
        self.voices.get(voice).map(|v| v.circle.entropy())
    }

    pub fn pulse(&self, voice: usize) -> Option<&[f32]> {
        self.voices.get(voice).map(|v| v.circle.pulse())
    }

    /// Start a voice. Returns false for unknown or already sounding voices.
    pub fn press(&mut self, voice: usize) -> bool {
        if voice >= self.voices.len() || !self.active.insert(voice) {
            return false;
        }
        self.voices[voice].phase = 0;
        true
    }

    /// Stop a voice. Returns false if it was not sounding.
    pub fn release(&mut self, voice: usize) -> bool {
        self.active.remove(&voice)
    }

    pub fn release_all(&mut self) {
        self.active.clear();
    }

    /// Average the pulses of all sounding voices into the rightmost one.
    ///
    /// Returns the voice that received the merged pulse.
    pub fn merge(&mut self) -> Option<usize> {
        let target = *self.active.last()?;
        let merged = {
            let pulses: Vec<&[f32]> = self
                .active
                .iter()
                .map(|&i| self.voices[i].circle.pulse())
                .collect();
            mean_pulse(&pulses)
        };
        self.voices[target].circle.set_pulse(merged);
        Some(target)
    }

    /// Transpose all voices, clamped to the configured range
    pub fn shift_pitch(&mut self, delta_octaves: f32) {
        let (lo, hi) = self.tuning.pitch_range_octaves;
        self.pitch_shift = (self.pitch_shift + delta_octaves).clamp(lo, hi);
    }

    pub fn pitch_up(&mut self) {
        self.shift_pitch(self.tuning.pitch_step_octaves);
    }

    pub fn pitch_down(&mut self) {
        self.shift_pitch(-self.tuning.pitch_step_octaves);
    }

    /// Sounding frequency of a voice after transposition (Hz)
    pub fn frequency(&self, voice: usize) -> Option<f32> {
        self.voices
            .get(voice)
            .map(|v| v.base_hz * 2f32.powf(self.pitch_shift))
    }

    /// Fill `out` with the next block of mono samples.
    ///
    /// `now_s` is the stream time of the block start; it drives the entropy
    /// schedule of the sounding voices.
    pub fn render(&mut self, out: &mut [f32], now_s: f64) {
        out.fill(0.0);
        if self.active.is_empty() {
            return;
        }

        let transpose = 2f32.powf(self.pitch_shift);
        for &index in &self.active {
            let voice = &mut self.voices[index];
            voice.circle.maybe_update(now_s);

            let period = samples_per_cycle(
                self.sample_rate_hz,
                voice.base_hz * transpose,
                self.audio.min_cycle_samples,
            );
            voice.refresh_cycle(period);

            for sample in out.iter_mut() {
                *sample += voice.cycle[voice.phase];
                voice.phase += 1;
                if voice.phase == period {
                    voice.phase = 0;
                }
            }
        }

        let gain = self.audio.master_gain / self.active.len() as f32;
        let limit = self.audio.limit;
        for sample in out.iter_mut() {
            *sample = (*sample * gain).clamp(-limit, limit);
        }
    }

    pub fn snapshot(&self) -> InstrumentSnapshot {
        InstrumentSnapshot {
            voices: (0..self.voices.len())
                .map(|i| VoiceView {
                    active: self.active.contains(&i),
                    entropy: self.voices[i].circle.entropy() as f32,
                    frequency_hz: self.frequency(i).unwrap_or_default(),
                })
                .collect(),
            pitch_shift: self.pitch_shift,
        }
    }
}
