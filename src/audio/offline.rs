//! Headless rendering straight to a WAV file.

use std::path::Path;

use crate::error::Result;
use crate::instrument::Instrument;
use crate::params::audio_constants::BLOCK_SIZE;

/// Hold `voices` for `seconds` and write the mix as mono 32-bit float WAV.
///
/// Returns the number of frames written.
pub fn render_offline(
    instrument: &mut Instrument,
    seconds: f64,
    voices: &[usize],
    path: &Path,
) -> Result<u64> {
    let sample_rate = instrument.sample_rate_hz();
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate as u32,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;

    for &voice in voices {
        if !instrument.press(voice) {
            tracing::warn!(voice = voice + 1, "Voice unavailable or already held");
        }
    }

    let total_frames = (seconds.max(0.0) * sample_rate as f64).round() as u64;
    let mut block = vec![0.0f32; BLOCK_SIZE];
    let mut written: u64 = 0;

    while written < total_frames {
        let frames = (total_frames - written).min(BLOCK_SIZE as u64) as usize;
        let now_s = written as f64 / sample_rate as f64;
        instrument.render(&mut block[..frames], now_s);
        for &sample in &block[..frames] {
            writer.write_sample(sample)?;
        }
        written += frames as u64;
    }

    writer.finalize()?;
    tracing::info!(
        frames = written,
        "Rendered {:.2}s to {}",
        seconds,
        path.display()
    );
    Ok(written)
}
