//! Error types for voxline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxlineError {
    // Input errors
    #[error("Audio file not found at {path}")]
    FileNotFound { path: String },

    #[error("Unsupported audio format: {message}")]
    InvalidFormat { message: String },

    #[error("Audio too short to transcribe ({duration_secs:.3}s)")]
    AudioTooShort { duration_secs: f64 },

    // Conversion errors
    #[error("Failed to read audio data: {message}")]
    ReadFailed { message: String },

    #[error("Audio conversion failed: {message}")]
    ConversionFailed { message: String },

    // Engine errors
    #[error("Recognition model failed to load: {message}")]
    ModelLoadFailed { message: String },

    #[error("Recognition inference failed: {message}")]
    InferenceFailed { message: String },

    #[error("All recognition engines failed: {message}")]
    AllEnginesFailed { message: String },

    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxlineError>;
