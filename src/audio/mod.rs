//! Audio output and spectrum analysis.
//!
//! Streams the instrument to an output device with cpal, tees the mix to an
//! optional WAV recording and to a background FFT thread that measures band
//! energies and spectral entropy for the display.

mod fft;
mod offline;
mod system;

// Re-export public types
pub use fft::{spectral_entropy, Analyzer, SpectrumBands};
pub use offline::render_offline;
pub use system::{list_output_devices, AudioSystem};
