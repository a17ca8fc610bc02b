//! Parameter definitions with physical units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Physical units (seconds, Hz, octaves, pixels)
//! - Documented ranges and meanings
//! - Defaults matching the reference tuning of the instrument

mod audio;
mod display;
mod lorenz;
mod render;
mod style;
mod voices;

// Re-export all types
pub use audio::{audio_constants, AudioParams, FFTConfig, MAX_UPDATE_INTERVAL_MS, MIN_FFT_SIZE};
pub use display::DisplayConfig;
pub use lorenz::{EntropyParams, LorenzParams, PulseParams};
pub use render::RecordingConfig;
pub use style::StyleParams;
pub use voices::{VoiceParams, MAX_VOICES, MIN_FREQUENCY_HZ};
