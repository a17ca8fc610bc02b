//! Idle-time style model.
//!
//! While the player performs, note onsets, hold times and the gaps between
//! onsets are recorded together with first-order voice transitions. Once
//! the player has been idle for a while, the [`Autoplayer`] keeps the
//! instrument going with notes resampled from those statistics, and gives
//! control back the moment a key is touched.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, VecDeque};

use crate::instrument::Instrument;
use crate::params::StyleParams;

/// Shortest hold or gap the autoplayer will schedule (seconds)
const MIN_EVENT_SECS: f64 = 0.05;

/// A note drawn from the model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledNote {
    pub voice: usize,
    pub hold_s: f64,
    /// Time until the following onset
    pub gap_s: f64,
}

/// Online statistics of the player's timing and voice choices
#[derive(Debug, Clone)]
pub struct StyleModel {
    params: StyleParams,
    /// `transitions[from][to]` onset counts
    transitions: Vec<Vec<u32>>,
    holds: VecDeque<f64>,
    gaps: VecDeque<f64>,
    pressed_at: Vec<Option<f64>>,
    last_onset: Option<(usize, f64)>,
    onsets: usize,
}

impl StyleModel {
    pub fn new(params: StyleParams, voice_count: usize) -> Self {
        Self {
            transitions: vec![vec![0; voice_count]; voice_count],
            holds: VecDeque::with_capacity(params.history_len),
            gaps: VecDeque::with_capacity(params.history_len),
            pressed_at: vec![None; voice_count],
            last_onset: None,
            onsets: 0,
            params,
        }
    }

    pub fn onsets(&self) -> usize {
        self.onsets
    }

    pub fn last_voice(&self) -> Option<usize> {
        self.last_onset.map(|(voice, _)| voice)
    }

    pub fn transition_count(&self, from: usize, to: usize) -> u32 {
        self.transitions
            .get(from)
            .and_then(|row| row.get(to))
            .copied()
            .unwrap_or(0)
    }

    pub fn note_on(&mut self, voice: usize, now_s: f64) {
        if voice >= self.pressed_at.len() {
            return;
        }
        if let Some((previous, previous_s)) = self.last_onset {
            self.transitions[previous][voice] += 1;
            let gap = now_s - previous_s;
            // Pauses longer than a phrase gap are not part of the style
            if gap >= 0.0 && gap <= self.params.max_event_secs {
                push_bounded(&mut self.gaps, gap, self.params.history_len);
            }
        }
        self.last_onset = Some((voice, now_s));
        self.pressed_at[voice] = Some(now_s);
        self.onsets += 1;
    }

    pub fn note_off(&mut self, voice: usize, now_s: f64) {
        let Some(pressed_s) = self.pressed_at.get_mut(voice).and_then(Option::take) else {
            return;
        };
        let hold = (now_s - pressed_s).clamp(0.0, self.params.max_event_secs);
        push_bounded(&mut self.holds, hold, self.params.history_len);
    }

    /// Enough observations to imitate the player: `min_notes` onsets plus
    /// at least one recorded hold and one in-phrase gap to sample from
    pub fn is_trained(&self) -> bool {
        self.onsets >= self.params.min_notes && !self.holds.is_empty() && !self.gaps.is_empty()
    }

    /// Draw the next note given the previous voice.
    ///
    /// Voices follow the observed transitions with add-one smoothing; hold
    /// and gap durations are drawn from the recorded histories.
    pub fn next_phrase_note<R: Rng>(
        &self,
        rng: &mut R,
        previous: Option<usize>,
    ) -> Option<SampledNote> {
        if !self.is_trained() {
            return None;
        }

        let weights: Vec<u32> = match previous {
            Some(from) if from < self.transitions.len() => {
                self.transitions[from].iter().map(|c| c + 1).collect()
            }
            // No context: how often each voice was chosen at all
            _ => (0..self.transitions.len())
                .map(|to| self.transitions.iter().map(|row| row[to]).sum::<u32>() + 1)
                .collect(),
        };
        let voice = WeightedIndex::new(&weights).ok()?.sample(rng);

        let hold_s = self.holds[rng.gen_range(0..self.holds.len())].max(MIN_EVENT_SECS);
        let gap_s = self.gaps[rng.gen_range(0..self.gaps.len())].max(MIN_EVENT_SECS);

        Some(SampledNote {
            voice,
            hold_s,
            gap_s,
        })
    }
}

fn push_bounded(history: &mut VecDeque<f64>, value: f64, capacity: usize) {
    if history.len() == capacity {
        history.pop_front();
    }
    history.push_back(value);
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum AutoplayState {
    Listening,
    Playing {
        /// Autoplayed voice and its release time
        held: Option<(usize, f64)>,
        next_onset_s: f64,
        previous: Option<usize>,
    },
}

/// Learns from the player and takes over while they are idle
pub struct Autoplayer {
    params: StyleParams,
    model: StyleModel,
    rng: StdRng,
    user_held: BTreeSet<usize>,
    last_user_event_s: f64,
    state: AutoplayState,
}

impl Autoplayer {
    /// `seed` makes the phrases reproducible; `None` seeds from the OS
    pub fn new(params: StyleParams, voice_count: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            model: StyleModel::new(params.clone(), voice_count),
            params,
            rng,
            user_held: BTreeSet::new(),
            last_user_event_s: 0.0,
            state: AutoplayState::Listening,
        }
    }

    pub fn model(&self) -> &StyleModel {
        &self.model
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, AutoplayState::Playing { .. })
    }

    /// The player pressed a voice key
    pub fn user_press(&mut self, voice: usize, now_s: f64, instrument: &mut Instrument) {
        self.stop(instrument);
        if self.user_held.insert(voice) {
            self.model.note_on(voice, now_s);
        }
        self.last_user_event_s = now_s;
    }

    /// The player released a voice key
    pub fn user_release(&mut self, voice: usize, now_s: f64, instrument: &mut Instrument) {
        self.stop(instrument);
        if self.user_held.remove(&voice) {
            self.model.note_off(voice, now_s);
        }
        self.last_user_event_s = now_s;
    }

    /// Any other control (pitch, merge) counts as activity
    pub fn user_activity(&mut self, now_s: f64, instrument: &mut Instrument) {
        self.stop(instrument);
        self.last_user_event_s = now_s;
    }

    /// Advance the schedule; call regularly from the UI loop
    pub fn tick(&mut self, now_s: f64, instrument: &mut Instrument) {
        if !self.params.enabled {
            return;
        }

        let state = self.state;
        match state {
            AutoplayState::Listening => {
                let idle = now_s - self.last_user_event_s >= self.params.idle_secs;
                if idle && self.user_held.is_empty() && self.model.is_trained() {
                    tracing::info!(
                        onsets = self.model.onsets(),
                        "Player idle, autoplay started"
                    );
                    self.state = AutoplayState::Playing {
                        held: None,
                        next_onset_s: now_s,
                        previous: self.model.last_voice(),
                    };
                }
            }
            AutoplayState::Playing {
                mut held,
                mut next_onset_s,
                mut previous,
            } => {
                if let Some((voice, release_s)) = held {
                    if now_s >= release_s {
                        instrument.release(voice);
                        held = None;
                    }
                }

                if now_s >= next_onset_s {
                    if let Some((voice, _)) = held.take() {
                        instrument.release(voice);
                    }
                    if let Some(note) = self.model.next_phrase_note(&mut self.rng, previous) {
                        tracing::debug!(?note, "Autoplay note");
                        instrument.press(note.voice);
                        held = Some((note.voice, now_s + note.hold_s));
                        next_onset_s = now_s + note.gap_s;
                        previous = Some(note.voice);
                    }
                }

                self.state = AutoplayState::Playing {
                    held,
                    next_onset_s,
                    previous,
                };
            }
        }
    }

    /// Hand control back to the player
    fn stop(&mut self, instrument: &mut Instrument) {
        if let AutoplayState::Playing { held, .. } = self.state {
            if let Some((voice, _)) = held {
                instrument.release(voice);
            }
            tracing::info!("Player returned, autoplay stopped");
        }
        self.state = AutoplayState::Listening;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstrumentConfig;

    fn params() -> StyleParams {
        StyleParams {
            enabled: true,
            idle_secs: 5.0,
            min_notes: 4,
            ..StyleParams::default()
        }
    }

    fn instrument() -> Instrument {
        Instrument::new(&InstrumentConfig::default(), 44100.0)
    }

    /// Alternate voices 0 and 1, half-second holds, one note per second
    fn play_phrase(auto: &mut Autoplayer, inst: &mut Instrument, notes: usize) -> f64 {
        let mut t = 0.0;
        for i in 0..notes {
            let voice = i % 2;
            auto.user_press(voice, t, inst);
            inst.press(voice);
            auto.user_release(voice, t + 0.5, inst);
            inst.release(voice);
            t += 1.0;
        }
        t - 0.5
    }

    #[test]
    fn test_model_records_transitions_and_timing() {
        let mut model = StyleModel::new(params(), 4);
        model.note_on(0, 0.0);
        model.note_off(0, 0.25);
        model.note_on(2, 1.0);
        model.note_off(2, 1.5);

        assert_eq!(model.onsets(), 2);
        assert_eq!(model.transition_count(0, 2), 1);
        assert_eq!(model.transition_count(2, 0), 0);
        assert_eq!(model.last_voice(), Some(2));
        assert!(!model.is_trained());
    }

    #[test]
    fn test_long_pauses_are_not_gaps() {
        let mut model = StyleModel::new(params(), 2);
        for i in 0..4 {
            model.note_on(0, i as f64 * 100.0);
            model.note_off(0, i as f64 * 100.0 + 0.5);
        }
        // Four onsets, but every gap exceeded the phrase limit
        assert!(!model.is_trained());
    }

    #[test]
    fn test_untrained_model_samples_nothing() {
        let model = StyleModel::new(params(), 4);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(model.next_phrase_note(&mut rng, None), None);
    }

    #[test]
    fn test_sampling_follows_transitions() {
        let mut model = StyleModel::new(params(), 4);
        for i in 0..60 {
            let t = i as f64;
            model.note_on(i % 2, t);
            model.note_off(i % 2, t + 0.3);
        }
        assert!(model.is_trained());

        let mut rng = StdRng::seed_from_u64(7);
        let after_zero = (0..200)
            .filter_map(|_| model.next_phrase_note(&mut rng, Some(0)))
            .filter(|note| note.voice == 1)
            .count();
        assert!(after_zero > 150, "expected mostly 0 -> 1, got {}", after_zero);

        let note = model.next_phrase_note(&mut rng, Some(1)).unwrap();
        assert!((note.hold_s - 0.3).abs() < 1e-9);
        assert!((note.gap_s - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_history_is_bounded() {
        let small = StyleParams {
            history_len: 3,
            ..params()
        };
        let mut model = StyleModel::new(small, 1);
        for i in 0..10 {
            model.note_on(0, i as f64);
            model.note_off(0, i as f64 + 0.1 * (i + 1) as f64);
        }
        assert_eq!(model.holds.len(), 3);
        assert_eq!(model.gaps.len(), 3);
        // Oldest observations were dropped
        assert!((model.holds[0] - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_autoplay_waits_for_idle_and_training() {
        let mut inst = instrument();
        let mut auto = Autoplayer::new(params(), 4, Some(3));

        auto.tick(100.0, &mut inst);
        assert!(!auto.is_playing(), "untrained model must not play");

        let end = play_phrase(&mut auto, &mut inst, 6);
        auto.tick(end + 1.0, &mut inst);
        assert!(!auto.is_playing(), "not idle long enough");

        auto.tick(end + 5.0, &mut inst);
        assert!(auto.is_playing());
        auto.tick(end + 5.0, &mut inst);
        assert_eq!(inst.active_voices().count(), 1);
    }

    #[test]
    fn test_user_input_cancels_autoplay() {
        let mut inst = instrument();
        let mut auto = Autoplayer::new(params(), 4, Some(11));
        let end = play_phrase(&mut auto, &mut inst, 6);
        let onsets = auto.model().onsets();

        auto.tick(end + 10.0, &mut inst);
        auto.tick(end + 10.0, &mut inst);
        assert!(auto.is_playing());
        assert_eq!(inst.active_voices().count(), 1);

        auto.user_activity(end + 10.5, &mut inst);
        assert!(!auto.is_playing());
        assert_eq!(inst.active_voices().count(), 0);
        // Autoplayed notes are not learned
        assert_eq!(auto.model().onsets(), onsets);
    }

    #[test]
    fn test_disabled_autoplayer_never_plays() {
        let mut inst = instrument();
        let disabled = StyleParams {
            enabled: false,
            ..params()
        };
        let mut auto = Autoplayer::new(disabled, 4, Some(5));
        let end = play_phrase(&mut auto, &mut inst, 6);
        auto.tick(end + 60.0, &mut inst);
        assert!(!auto.is_playing());
    }
}
