//! Error types for catalog access.

use thiserror::Error;

/// Result type alias using CatalogError.
pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid catalog response: {0}")]
    InvalidResponse(String),
}

impl CatalogError {
    /// Map a non-success HTTP status to the matching error variant.
    pub fn from_status(status: reqwest::StatusCode, url: &str) -> Self {
        match status {
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                CatalogError::Auth(format!("{} rejected with {}", url, status))
            }
            _ => CatalogError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            },
        }
    }
}
