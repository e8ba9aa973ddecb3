//! OAuth2 access tokens for the Admin API

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Token endpoint of the GCE / Cloud Run metadata server
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server says they expire
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Supplies bearer tokens for Admin API calls
#[async_trait]
pub trait TokenSource: Send + Sync + std::fmt::Debug {
    /// Return a currently valid access token
    async fn token(&self) -> Result<String>;
}

/// A fixed token, e.g. from `GOOGLE_OAUTH_ACCESS_TOKEN`
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    /// Wrap a token
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Default service account token from the metadata server, cached until near expiry
pub struct MetadataServerToken {
    http: reqwest::Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataServerToken {
    /// Use the standard metadata server endpoint
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_url(http, METADATA_TOKEN_URL)
    }

    /// Use a custom token endpoint
    pub fn with_url(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<MetadataTokenResponse> {
        let response = self
            .http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::AdminApi(format!(
                "metadata server returned {}: {}",
                status, body
            )));
        }
        Ok(response.json().await?)
    }
}

impl std::fmt::Debug for MetadataServerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataServerToken")
            .field("url", &self.url)
            .finish()
    }
}

#[async_trait]
impl TokenSource for MetadataServerToken {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(ref c) = *cached {
            if Instant::now() < c.refresh_at {
                return Ok(c.token.clone());
            }
        }

        let fresh = self.fetch().await?;
        tracing::debug!(expires_in = fresh.expires_in, "fetched metadata server token");
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
        *cached = Some(CachedToken {
            token: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(fresh.access_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_token() {
        let source = StaticToken::new("ya29.abc");
        assert_eq!(source.token().await.unwrap(), "ya29.abc");
        assert!(!format!("{:?}", source).contains("ya29"));
    }

    #[tokio::test]
    async fn test_metadata_server_unreachable() {
        let source = MetadataServerToken::with_url(reqwest::Client::new(), "http://127.0.0.1:1/token");
        let err = source.token().await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[test]
    fn test_parse_metadata_response() {
        let body = r#"{"access_token":"ya29.x","expires_in":3599,"token_type":"Bearer"}"#;
        let parsed: MetadataTokenResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.access_token, "ya29.x");
        assert_eq!(parsed.expires_in, 3599);
    }
}
