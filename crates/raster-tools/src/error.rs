//! Error types for raster tool invocations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using RasterError.
pub type RasterResult<T> = Result<T, RasterError>;

#[derive(Debug, Error)]
pub enum RasterError {
    /// The program could not be started at all
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully
    #[error("{program} exited with {status}: {stderr}")]
    ToolFailed {
        program: String,
        status: String,
        stderr: String,
    },

    /// The program succeeded but an expected file is not there
    #[error("Expected output not produced: {0}")]
    MissingOutput(PathBuf),

    #[error("Invalid extent: {0}")]
    InvalidExtent(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
