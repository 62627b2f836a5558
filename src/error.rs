//! Error types for EEG Stress Flux

use thiserror::Error;

/// Errors that can occur at the edges of the pipeline.
///
/// The core stages never fail: malformed values are coerced, empty windows
/// produce zeros and render failures are logged. These variants cover record
/// parsing, configuration, mesh loading and session plumbing.
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Failed to parse record: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Invalid window: {0}")]
    WindowError(String),

    #[error("Mesh error: {0}")]
    MeshError(String),

    #[error("Session closed: {0}")]
    SessionClosed(String),
}
