//! Error types for signstream.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignstreamError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Dictionary errors
    #[error("Failed to load dictionary from {path}: {message}")]
    DictionaryLoad { path: String, message: String },

    // Landmark input errors
    #[error("Malformed landmarks: {message}")]
    MalformedLandmarks { message: String },

    // Classifier errors
    #[error("Classifier request failed: {message}")]
    Classifier { message: String },

    #[error("Classifier did not answer within {timeout_ms}ms")]
    ClassifierTimeout { timeout_ms: u64 },

    #[error("Classifier unavailable: {message}")]
    ClassifierUnavailable { message: String },

    // Replay input errors
    #[error("Invalid frame record on line {line}: {message}")]
    FrameDecode { line: usize, message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SignstreamError>;
