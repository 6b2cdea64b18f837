//! Error types for pitch-to-note transcription

use thiserror::Error;

/// Errors that can occur while turning a pitch track into a MIDI file
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// A numeric parameter is out of its valid range
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A frame of the pitch track is unusable
    #[error("invalid frame {index}: {reason}")]
    InvalidFrame { index: usize, reason: String },

    /// Reading or writing a file failed
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// A pitch track file could not be parsed
    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A configuration file could not be read
    #[error("configuration error: {0}")]
    Config(String),

    /// An external pitch tracker or score renderer failed
    #[error("collaborator failed: {0}")]
    Collaborator(String),
}

pub type Result<T> = std::result::Result<T, TranscriptionError>;

impl TranscriptionError {
    pub(crate) fn invalid_parameter(message: impl Into<String>) -> Self {
        TranscriptionError::InvalidParameter(message.into())
    }

    pub(crate) fn invalid_frame(index: usize, reason: impl Into<String>) -> Self {
        TranscriptionError::InvalidFrame { index, reason: reason.into() }
    }
}

/// Fails with `InvalidParameter` unless `value` is finite and strictly positive.
pub(crate) fn require_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(TranscriptionError::invalid_parameter(format!("{name} must be a positive number, got {value}")))
    }
}

/// Fails with `InvalidParameter` unless `value` is finite and not negative.
pub(crate) fn require_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(TranscriptionError::invalid_parameter(format!("{name} must be zero or greater, got {value}")))
    }
}
