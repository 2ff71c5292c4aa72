//! Bearer tokens for Google APIs

use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, bail};
use reqwest::RequestBuilder;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;

const LOG_TARGET: &str = "     token";

/// Token endpoint of the instance metadata server.
pub const METADATA_TOKEN_URL: &str = "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the metadata server says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// How requests to Google APIs are authorized.
#[derive(Debug)]
pub enum Credentials {
    /// No `Authorization` header, as used with the Pub/Sub emulator.
    Anonymous,

    /// A fixed access token supplied by the operator.
    Static(String),

    /// Tokens fetched from the metadata server and cached until shortly before expiry.
    Metadata(MetadataTokenSource),
}

impl Credentials {
    /// Adds an `Authorization` header to `request` when credentials are configured.
    pub async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        match self {
            Self::Anonymous => Ok(request),
            Self::Static(token) => Ok(request.bearer_auth(token)),
            Self::Metadata(source) => Ok(request.bearer_auth(source.token().await?)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Fetches access tokens for the instance's default service account.
#[derive(Debug)]
pub struct MetadataTokenSource {
    client: reqwest::Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataTokenSource {
    #[must_use]
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, fetching a fresh one when the cached token is about to expire.
    pub async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        log::debug!(target: LOG_TARGET, "Fetching access token from '{}'", self.url);

        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .into_app_err("unable to reach the metadata server")?;

        if !response.status().is_success() {
            bail!("metadata server refused the token request: HTTP {}", response.status());
        }

        let body: TokenResponse = response.json().await.into_app_err("malformed token response from the metadata server")?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_MARGIN);

        *cached = Some(CachedToken {
            value: body.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(body.access_token)
    }
}
