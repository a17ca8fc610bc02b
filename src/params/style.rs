//! Idle-time style model parameters.

use serde::Deserialize;

use crate::error::{DriftError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleParams {
    /// Replay learned phrases while the player is idle
    pub enabled: bool,

    /// Idle time before autoplay starts (seconds)
    pub idle_secs: f64,

    /// Note onsets required before the model is considered trained
    pub min_notes: usize,

    /// Observations kept per history (durations, gaps)
    pub history_len: usize,

    /// Upper bound on sampled hold and gap durations (seconds)
    pub max_event_secs: f64,
}

impl Default for StyleParams {
    fn default() -> Self {
        Self {
            enabled: false,
            idle_secs: 8.0,
            min_notes: 4,
            history_len: 256,
            max_event_secs: 6.0,
        }
    }
}

impl StyleParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.idle_secs.is_finite() && self.idle_secs >= 0.0) {
            return Err(DriftError::config("Idle time must be >= 0"));
        }
        if self.history_len == 0 {
            return Err(DriftError::config("Style history length must be > 0"));
        }
        if !(self.max_event_secs > 0.0) {
            return Err(DriftError::config("Maximum event duration must be > 0"));
        }
        Ok(())
    }
}
