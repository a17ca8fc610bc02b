//! Recording and offline-render output locations.

use std::path::PathBuf;

use crate::error::Result;

/// Recording mode configuration
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Output directory for WAV files
    pub output_dir: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self::new("recording")
    }
}

impl RecordingConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Live session audio path
    pub fn session_path(&self) -> PathBuf {
        self.output_dir.join("session.wav")
    }

    /// Offline render audio path
    pub fn render_path(&self) -> PathBuf {
        self.output_dir.join("render.wav")
    }

    /// Create the output directory if missing
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_live_under_output_dir() {
        let config = RecordingConfig::new("out");
        assert_eq!(config.session_path(), PathBuf::from("out/session.wav"));
        assert_eq!(config.render_path(), PathBuf::from("out/render.wav"));
    }
}
