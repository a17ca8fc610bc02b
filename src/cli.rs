//! Command-line argument parsing.

use clap::Parser;
use std::path::PathBuf;

use crate::config::InstrumentConfig;
use crate::error::{DriftError, Result};
use crate::params::RecordingConfig;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "driftatone")]
#[command(about = "Drift-A-Tone: a drone instrument shaped by Lorenz attractors", long_about = None)]
pub struct Args {
    /// TOML file overriding the built-in parameters
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output device (case-insensitive part of its name)
    #[arg(long, value_name = "NAME")]
    pub device: Option<String>,

    /// Print available output devices and exit
    #[arg(long)]
    pub list_devices: bool,

    /// Record the session to <OUTPUT_DIR>/session.wav
    #[arg(long)]
    pub record: bool,

    /// Directory for recordings and renders
    #[arg(long, value_name = "DIR", default_value = "recording")]
    pub output_dir: PathBuf,

    /// Render headless for SECONDS to <OUTPUT_DIR>/render.wav
    #[arg(long, value_name = "SECONDS")]
    pub render: Option<f64>,

    /// Voices held during --render, as digits (e.g. "13")
    #[arg(long, value_name = "KEYS", default_value = "1")]
    pub hold: String,

    /// Replay learned phrases while idle
    #[arg(long)]
    pub autoplay: bool,

    /// Seed for reproducible autoplay
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Defaults, overridden by --config, then by flags
    pub fn load_config(&self) -> Result<InstrumentConfig> {
        let mut config = match &self.config {
            Some(path) => InstrumentConfig::load(path)?,
            None => InstrumentConfig::default(),
        };
        if self.autoplay {
            config.style.enabled = true;
        }
        Ok(config)
    }

    pub fn recording_config(&self) -> RecordingConfig {
        RecordingConfig::new(self.output_dir.clone())
    }

    /// Render length, if headless mode was requested
    pub fn render_seconds(&self) -> Result<Option<f64>> {
        match self.render {
            Some(seconds) if !(seconds.is_finite() && seconds >= 0.0) => Err(DriftError::config(
                format!("Render length must be >= 0 seconds, got {}", seconds),
            )),
            other => Ok(other),
        }
    }
}

/// Parse held voices from digit labels ("13", "1,3"), zero-based and deduplicated
pub fn parse_hold(keys: &str, voice_count: usize) -> Result<Vec<usize>> {
    let mut voices = Vec::new();
    for c in keys.chars().filter(|c| !c.is_whitespace() && *c != ',') {
        let voice = c
            .to_digit(10)
            .map(|d| d as usize)
            .filter(|d| (1..=voice_count).contains(d))
            .ok_or_else(|| {
                DriftError::config(format!(
                    "Unknown voice '{}' (expected 1..={})",
                    c, voice_count
                ))
            })?
            - 1;
        if !voices.contains(&voice) {
            voices.push(voice);
        }
    }
    Ok(voices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hold() {
        assert_eq!(parse_hold("13", 4).unwrap(), vec![0, 2]);
        assert_eq!(parse_hold("4, 1, 4", 4).unwrap(), vec![3, 0]);
        assert!(parse_hold("", 4).unwrap().is_empty());
        assert!(parse_hold("5", 4).is_err());
        assert!(parse_hold("0", 4).is_err());
        assert!(parse_hold("x", 4).is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["driftatone"]).unwrap();
        assert!(!args.record);
        assert_eq!(args.hold, "1");
        assert_eq!(args.output_dir, PathBuf::from("recording"));
        assert_eq!(args.render_seconds().unwrap(), None);
        assert!(!args.load_config().unwrap().style.enabled);
    }

    #[test]
    fn test_autoplay_flag_enables_style() {
        let args = Args::try_parse_from(["driftatone", "--autoplay", "--seed", "9"]).unwrap();
        assert!(args.load_config().unwrap().style.enabled);
        assert_eq!(args.seed, Some(9));
    }

    #[test]
    fn test_negative_render_rejected() {
        let args = Args::try_parse_from(["driftatone", "--render=-1"]).unwrap();
        assert!(args.render_seconds().is_err());
    }
}
