//! OAuth2 client-credentials token handling.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{CatalogError, CatalogResult};

/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Consumer key/secret pair issued by the Data Store.
#[derive(Clone)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
}

impl Credentials {
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: consumer_secret.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.consumer_key.trim().is_empty() || self.consumer_secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .finish()
    }
}

/// A bearer token and the instant it stops being valid.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Whether the token can still be used at `now` without refreshing.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - Duration::seconds(REFRESH_MARGIN_SECS) > now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_token(self, issued_at: DateTime<Utc>) -> AccessToken {
        let lifetime = self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS).max(0);
        AccessToken {
            value: self.access_token,
            expires_at: issued_at + Duration::seconds(lifetime),
        }
    }
}

/// Caches the current token and fetches a new one when it nears expiry.
pub(crate) struct TokenCache {
    token_url: String,
    credentials: Credentials,
    current: Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub(crate) fn new(token_url: String, credentials: Credentials) -> Self {
        Self {
            token_url,
            credentials,
            current: Mutex::new(None),
        }
    }

    /// Return a usable bearer token, refreshing it if needed.
    pub(crate) async fn bearer(&self, http: &Client) -> CatalogResult<String> {
        let mut current = self.current.lock().await;

        if let Some(token) = current.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
            debug!(expires_at = %token.expires_at, "Access token expiring, refreshing");
        }

        let token = self.request_token(http).await?;
        let value = token.value.clone();
        *current = Some(token);
        Ok(value)
    }

    async fn request_token(&self, http: &Client) -> CatalogResult<AccessToken> {
        let issued_at = Utc::now();
        let response = http
            .post(&self.token_url)
            .basic_auth(
                &self.credentials.consumer_key,
                Some(&self.credentials.consumer_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Auth(format!(
                "token request returned {}",
                status
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Auth(format!("malformed token response: {}", e)))?;

        let token = body.into_token(issued_at);
        info!(expires_at = %token.expires_at, "Obtained access token");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_token_freshness_margin() {
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let token = AccessToken {
            value: "abc".to_string(),
            expires_at: now + Duration::seconds(120),
        };
        assert!(token.is_fresh(now));
        assert!(!token.is_fresh(now + Duration::seconds(61)));
    }

    #[test]
    fn test_token_response_lifetime() {
        let issued = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let body: TokenResponse =
            serde_json::from_str(r#"{"access_token":"t","expires_in":3600,"token_type":"Bearer"}"#)
                .unwrap();
        let token = body.into_token(issued);
        assert_eq!(token.value, "t");
        assert_eq!(token.expires_at, issued + Duration::hours(1));
    }

    #[test]
    fn test_token_response_without_expiry() {
        let issued = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        let body: TokenResponse = serde_json::from_str(r#"{"access_token":"t"}"#).unwrap();
        assert_eq!(
            body.into_token(issued).expires_at,
            issued + Duration::seconds(DEFAULT_EXPIRES_IN_SECS)
        );
    }

    #[test]
    fn test_credentials_debug_hides_secret() {
        let creds = Credentials::new("key", "hunter2");
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("key"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_blank_credentials_are_empty() {
        assert!(Credentials::new("", "secret").is_empty());
        assert!(Credentials::new("key", "  ").is_empty());
        assert!(!Credentials::new("key", "secret").is_empty());
    }
}
