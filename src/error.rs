//! Crate-wide error type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriftError {
    #[error("No audio output device found")]
    NoOutputDevice,

    #[error("No output device matching '{0}'")]
    DeviceNotFound(String),

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Audio stream error: {0}")]
    Stream(String),

    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Window error: {0}")]
    Window(String),

    #[error("GPU error: {0}")]
    Gpu(String),
}

impl DriftError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<cpal::DevicesError> for DriftError {
    fn from(e: cpal::DevicesError) -> Self {
        Self::Device(e.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for DriftError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        Self::Device(e.to_string())
    }
}

impl From<cpal::BuildStreamError> for DriftError {
    fn from(e: cpal::BuildStreamError) -> Self {
        Self::Stream(e.to_string())
    }
}

impl From<cpal::PlayStreamError> for DriftError {
    fn from(e: cpal::PlayStreamError) -> Self {
        Self::Stream(e.to_string())
    }
}

impl From<winit::error::EventLoopError> for DriftError {
    fn from(e: winit::error::EventLoopError) -> Self {
        Self::Window(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DriftError>;
