//! Instrument configuration: defaults, TOML overrides and validation.

use serde::Deserialize;
use std::path::Path;

use crate::error::Result;
use crate::params::{
    AudioParams, DisplayConfig, EntropyParams, FFTConfig, LorenzParams, PulseParams,
    StyleParams, VoiceParams,
};

/// Every tunable of the instrument, one TOML table per field
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InstrumentConfig {
    pub audio: AudioParams,
    pub analysis: FFTConfig,
    pub lorenz: LorenzParams,
    pub entropy: EntropyParams,
    pub pulse: PulseParams,
    pub voices: VoiceParams,
    pub style: StyleParams,
    pub display: DisplayConfig,
}

impl InstrumentConfig {
    /// Load a TOML file; keys it omits keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.audio.validate()?;
        self.analysis.validate()?;
        self.lorenz.validate()?;
        self.entropy.validate()?;
        self.pulse.validate()?;
        self.voices.validate()?;
        self.style.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriftError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_validate() {
        assert!(InstrumentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = InstrumentConfig::from_toml_str(
            r#"
            [voices]
            base_frequencies_hz = [55.0, 110.0]

            [entropy]
            update_interval_s = 0.5
            "#,
        )
        .unwrap();

        assert_eq!(config.voices.base_frequencies_hz, vec![55.0, 110.0]);
        assert_eq!(config.voices.pitch_step_octaves, 0.1);
        assert_eq!(config.entropy.update_interval_s, 0.5);
        assert_eq!(config.entropy.step, 0.02);
        assert_eq!(config.pulse.length, 512);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = InstrumentConfig::from_toml_str("[audio]\nvolume = 3\n").unwrap_err();
        assert!(matches!(err, DriftError::ConfigParse(_)));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = InstrumentConfig::from_toml_str("[analysis]\nfft_size = 1000\n").unwrap_err();
        assert!(matches!(err, DriftError::Config { .. }));
    }

    #[test]
    fn test_degenerate_analysis_rejected() {
        for text in [
            "[analysis]\nfft_size = 1\n",
            "[analysis]\nupdate_interval_ms = 3600000\n",
            "[voices]\nbase_frequencies_hz = [0.000001]\n",
        ] {
            let err = InstrumentConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, DriftError::Config { .. }), "{}", text);
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[style]\nenabled = true\nidle_secs = 3.0").unwrap();

        let config = InstrumentConfig::load(file.path()).unwrap();
        assert!(config.style.enabled);
        assert_eq!(config.style.idle_secs, 3.0);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = InstrumentConfig::load(Path::new("/nonexistent/driftatone.toml")).unwrap_err();
        assert!(matches!(err, DriftError::Io(_)));
    }
}
