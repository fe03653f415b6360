//! HTTP implementation of the catalog.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{StreamExt, TryStreamExt};
use reqwest::{header, Client, Response};
use tracing::{debug, info, instrument};

use crate::auth::{Credentials, TokenCache};
use crate::error::{CatalogError, CatalogResult};
use crate::product::{filename_from_disposition, Product, ProductDownload, SearchResponse};
use crate::Catalog;

pub const DEFAULT_API_URL: &str = "https://api.eumetsat.int";

/// Maximum page size accepted by the search endpoint.
const SEARCH_PAGE_SIZE: u32 = 100;

/// Configuration for [`EumdacClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL, without trailing slash
    pub api_url: String,
    pub credentials: Credentials,
    /// Whole-request timeout, including streaming the body
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            credentials,
            request_timeout: Duration::from_secs(600),
        }
    }
}

/// Authenticated client for the Data Store search and download APIs.
pub struct EumdacClient {
    http: Client,
    api_url: String,
    tokens: TokenCache,
}

impl EumdacClient {
    /// Build the client and perform the initial credentials exchange.
    pub async fn connect(config: ClientConfig) -> CatalogResult<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        let api_url = config.api_url.trim_end_matches('/').to_string();
        let tokens = TokenCache::new(token_url(&api_url), config.credentials);

        let client = Self {
            http,
            api_url,
            tokens,
        };
        client.tokens.bearer(&client.http).await?;

        info!(api_url = %client.api_url, "Connected to catalog");
        Ok(client)
    }

    async fn checked(response: Response) -> CatalogResult<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(CatalogError::from_status(status, response.url().as_str()))
        }
    }
}

#[async_trait]
impl Catalog for EumdacClient {
    #[instrument(skip(self))]
    async fn search(
        &self,
        collection: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> CatalogResult<Vec<Product>> {
        let token = self.tokens.bearer(&self.http).await?;
        let url = search_url(&self.api_url);

        let response = self
            .http
            .get(&url)
            .query(&search_params(collection, start, end))
            .bearer_auth(token)
            .send()
            .await?;

        let body: SearchResponse = Self::checked(response)
            .await?
            .json()
            .await
            .map_err(|e| CatalogError::InvalidResponse(e.to_string()))?;

        let products = body.into_products()?;
        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    #[instrument(skip(self))]
    async fn open(&self, collection: &str, identifier: &str) -> CatalogResult<ProductDownload> {
        let token = self.tokens.bearer(&self.http).await?;
        let url = download_url(&self.api_url, collection, identifier);

        let response = Self::checked(self.http.get(&url).bearer_auth(token).send().await?).await?;

        let filename = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| format!("{}.zip", identifier));

        let content_length = response.content_length();
        debug!(filename = %filename, content_length = ?content_length, "Opened product download");

        let stream = response
            .bytes_stream()
            .map_err(CatalogError::from)
            .boxed();

        Ok(ProductDownload {
            filename,
            content_length,
            stream,
        })
    }
}

fn token_url(api_url: &str) -> String {
    format!("{}/token", api_url)
}

fn search_url(api_url: &str) -> String {
    format!("{}/data/search-products/1.0.0/os", api_url)
}

fn download_url(api_url: &str, collection: &str, identifier: &str) -> String {
    format!(
        "{}/data/download/1.0.0/collections/{}/products/{}",
        api_url,
        urlencoding::encode(collection),
        urlencoding::encode(identifier)
    )
}

/// Format an instant the way the search endpoint expects it.
pub fn format_search_time(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

fn search_params(
    collection: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    vec![
        ("pi", collection.to_string()),
        ("si", "0".to_string()),
        ("c", SEARCH_PAGE_SIZE.to_string()),
        ("sort", "start,time,0".to_string()),
        ("dtstart", format_search_time(start)),
        ("dtend", format_search_time(end)),
        ("format", "json".to_string()),
    ]
}
