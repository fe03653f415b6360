//! Client for the EUMETSAT Data Store product catalog.
//!
//! Provides:
//! - OAuth2 client-credentials authentication with token caching
//! - Time-windowed product search for a collection
//! - Streaming download of raw product archives
//!
//! The [`Catalog`] trait is the seam consumers program against; [`EumdacClient`]
//! is the HTTP implementation.

pub mod auth;
pub mod client;
pub mod error;
pub mod product;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use auth::{AccessToken, Credentials};
pub use client::{ClientConfig, EumdacClient, DEFAULT_API_URL};
pub use error::{CatalogError, CatalogResult};
pub use product::{ByteStream, Product, ProductDownload};

/// Remote archive of published products.
///
/// No retries happen behind this interface: every call is a single attempt and
/// transport or auth failures are returned to the caller.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Products of `collection` acquired within `[start, end]`, in catalog order.
    async fn search(
        &self,
        collection: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CatalogResult<Vec<Product>>;

    /// Open a streaming read of the raw archive for one product.
    async fn open(&self, collection: &str, identifier: &str) -> CatalogResult<ProductDownload>;
}
