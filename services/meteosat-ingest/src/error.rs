//! Error types for the ingest cycle.

use std::fmt;
use std::path::PathBuf;

use eumdac_client::CatalogError;
use raster_tools::RasterError;
use thiserror::Error;

use crate::state::StateError;

/// Result type alias using IngestError.
pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Error)]
pub enum IngestError {
    // === Remote ===
    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Download error: {0}")]
    Download(String),

    // === Processing ===
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Processing error: {0}")]
    Processing(#[from] RasterError),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Persistence ===
    #[error("State error: {0}")]
    State(#[from] StateError),
}

/// Broad class of a failure, used for logging and counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Search, download or auth against the catalog
    Remote,
    /// Extraction or one of the external raster tools
    Processing,
    /// Reading or committing the cursor state
    Persistence,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Remote => "remote",
            ErrorKind::Processing => "processing",
            ErrorKind::Persistence => "persistence",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IngestError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Catalog(_) | IngestError::Download(_) => ErrorKind::Remote,
            IngestError::Archive(_) | IngestError::Processing(_) | IngestError::Io { .. } => {
                ErrorKind::Processing
            }
            IngestError::State(_) => ErrorKind::Persistence,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        IngestError::Io {
            path: path.into(),
            source,
        }
    }
}
