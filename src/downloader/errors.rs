// Error types for the downloader core

use thiserror::Error;

/// Failures raised by the external extraction engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// yt-dlp or ffmpeg not found on the system
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Engine process ran and failed
    #[error("execution error: {0}")]
    ExecutionFailed(String),

    /// Failed to parse engine JSON output
    #[error("parse error: {0}")]
    ParseError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced to callers of the orchestrator.
///
/// Validation errors (`InvalidUrl`, `InvalidSelection`) are raised before
/// any I/O and without touching the observer. Engine errors are reported
/// to the observer first, then propagated.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// URL does not match any accepted YouTube pattern
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Offering index out of range for the session
    #[error("format index {index} is out of range ({count} formats available)")]
    InvalidSelection { index: usize, count: usize },

    /// Engine raised during metadata retrieval
    #[error("failed to fetch video info: {0}")]
    FetchFailure(#[source] EngineError),

    /// Engine raised during transfer or post-processing
    #[error("download failed: {0}")]
    DownloadFailure(#[source] EngineError),
}
