//! Error types for Synheart Neuro

use thiserror::Error;

/// Errors that can occur while running a neuro-adaptive session
#[derive(Debug, Error)]
pub enum NeuroError {
    #[error("Session is not connected")]
    NotConnected,

    #[error("Session is already connected or connecting")]
    AlreadyConnected,

    #[error("Device connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection attempt was cancelled by a disconnect")]
    ConnectionCancelled,

    #[error("A calibration is already running on this session")]
    CalibrationInProgress,

    #[error("Calibration interrupted after {collected} readings")]
    CalibrationInterrupted { collected: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
