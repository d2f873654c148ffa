//! Error types for wakegate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WakegateError {
    // Core taxonomy
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Out of memory: {message}")]
    OutOfMemory { message: String },

    // Engine failures, passed through the orchestrator untouched
    #[error("{engine} engine failed: {message}")]
    Engine {
        engine: &'static str,
        message: String,
    },

    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio collaborators
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    AudioFormatMismatch { expected: String, actual: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl WakegateError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WakegateError>;
