//! Resolution of `gsm:` configuration values through Secret Manager.
//!
//! A configuration value such as `gsm:projects/p/secrets/control-cel/versions/latest` is
//! replaced at startup by the payload of that secret version. Other values pass through.

use crate::Result;
use crate::publish::token::Credentials;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use core::future::Future;
use ohno::{EnrichableExt, IntoAppError, bail};
use serde::Deserialize;
use std::sync::Arc;

const LOG_TARGET: &str = "   secrets";

/// Prefix marking a value as a secret reference.
pub const SECRET_PREFIX: &str = "gsm:";

/// Production Secret Manager endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://secretmanager.googleapis.com";

/// Something that can read secret payloads by resource name.
pub trait SecretSource: Send + Sync {
    /// Returns the plaintext payload of the secret version `name`.
    fn access(&self, name: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Replaces a `gsm:` reference by its secret payload; returns other values unchanged.
pub async fn resolve<S: SecretSource>(value: &str, source: &S) -> Result<String> {
    let Some(reference) = value.strip_prefix(SECRET_PREFIX) else {
        return Ok(value.to_string());
    };

    let name = version_name(reference.trim());
    log::info!(target: LOG_TARGET, "Resolving secret '{name}'");
    source
        .access(&name)
        .await
        .map_err(|e| e.enrich_with(|| format!("unable to access secret '{name}'")))
}

/// Resolves `value` in place when it is present.
pub async fn resolve_option<S: SecretSource>(value: &mut Option<String>, source: &S) -> Result<()> {
    if let Some(v) = value.as_deref() {
        *value = Some(resolve(v, source).await?);
    }
    Ok(())
}

/// Adds `/versions/latest` to a bare secret name.
fn version_name(reference: &str) -> String {
    if reference.contains("/versions/") {
        reference.to_string()
    } else {
        format!("{}/versions/latest", reference.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct AccessResponse {
    payload: Payload,
}

#[derive(Debug, Deserialize)]
struct Payload {
    #[serde(default)]
    data: String,
}

/// Reads secrets through the Secret Manager REST API.
#[derive(Debug, Clone)]
pub struct SecretManager {
    client: reqwest::Client,
    endpoint: String,
    credentials: Arc<Credentials>,
}

impl SecretManager {
    #[must_use]
    pub fn new(client: reqwest::Client, endpoint: &str, credentials: Arc<Credentials>) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
        }
    }
}

impl SecretSource for SecretManager {
    async fn access(&self, name: &str) -> Result<String> {
        let url = format!("{}/v1/{name}:access", self.endpoint);
        let request = self.credentials.authorize(self.client.get(&url)).await?;
        let response = request.send().await.into_app_err("unable to reach Secret Manager")?;

        if !response.status().is_success() {
            bail!("Secret Manager refused access: HTTP {}", response.status());
        }

        let body: AccessResponse = response.json().await.into_app_err("malformed Secret Manager response")?;
        let bytes = STANDARD.decode(body.payload.data.as_bytes()).into_app_err("secret payload is not valid base64")?;
        String::from_utf8(bytes).into_app_err("secret payload is not valid UTF-8")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FixedSecrets(HashMap<&'static str, &'static str>);

    impl SecretSource for FixedSecrets {
        async fn access(&self, name: &str) -> Result<String> {
            self.0
                .get(name)
                .map(|v| (*v).to_string())
                .ok_or_else(|| ohno::app_err!("no such secret"))
        }
    }

    fn secrets() -> FixedSecrets {
        FixedSecrets(HashMap::from([("projects/p/secrets/control/versions/latest", "true")]))
    }

    #[tokio::test]
    async fn test_plain_values_pass_through() {
        assert_eq!(resolve("request.json", &secrets()).await.unwrap(), "request.json");
    }

    #[tokio::test]
    async fn test_reference_is_resolved() {
        assert_eq!(resolve("gsm:projects/p/secrets/control/versions/latest", &secrets()).await.unwrap(), "true");
        assert_eq!(resolve("gsm:projects/p/secrets/control", &secrets()).await.unwrap(), "true");
    }

    #[tokio::test]
    async fn test_missing_secret_fails() {
        let _ = resolve("gsm:projects/p/secrets/other", &secrets()).await.unwrap_err();
    }

    #[tokio::test]
    async fn test_resolve_option() {
        let mut value = Some("gsm:projects/p/secrets/control".to_string());
        resolve_option(&mut value, &secrets()).await.unwrap();
        assert_eq!(value.as_deref(), Some("true"));

        let mut none = None;
        resolve_option(&mut none, &secrets()).await.unwrap();
        assert!(none.is_none());
    }
}
