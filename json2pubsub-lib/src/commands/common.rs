//! Argument groups and setup shared between the serve and validate commands.

use super::config::{Config, Settings};
use crate::Result;
use crate::publish::token::{Credentials, METADATA_TOKEN_URL, MetadataTokenSource};
use crate::publish::{DEFAULT_ENDPOINT as PUBSUB_ENDPOINT, USER_AGENT};
use crate::secrets::{DEFAULT_ENDPOINT as SECRET_MANAGER_ENDPOINT, SecretManager};
use camino::Utf8PathBuf;
use clap::{Args, ValueEnum};
use std::sync::Arc;

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

/// Where the pipeline's expressions and routing come from
#[derive(Args, Debug, Clone, Default)]
pub struct PipelineArgs {
    /// Path to a TOML configuration file
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Project used to qualify a short topic name
    #[arg(long, env = "GOOGLE_CLOUD_PROJECT", value_name = "PROJECT")]
    pub project: Option<String>,

    /// Pub/Sub topic to publish to
    #[arg(long, env = "PUBSUB_TOPIC", value_name = "TOPIC")]
    pub topic: Option<String>,

    /// Path the webhook is served on [default: /]
    #[arg(long, env = "CUSTOM_HANDLER", value_name = "PATH")]
    pub handler_path: Option<String>,

    /// Expression deciding whether a request is accepted
    #[arg(long, env = "CONTROL_CEL", value_name = "EXPR")]
    pub control_cel: Option<String>,

    /// Expression producing the message payload
    #[arg(long, env = "MESSAGE_CEL", value_name = "EXPR")]
    pub message_cel: Option<String>,

    /// Expression producing the response body
    #[arg(long, env = "RESPONSE_CEL", value_name = "EXPR")]
    pub response_cel: Option<String>,

    /// Largest accepted request body, in bytes [default: 1048576]
    #[arg(long, value_name = "BYTES")]
    pub max_body_bytes: Option<usize>,
}

/// How to reach and authenticate against Google APIs
#[derive(Args, Debug, Clone, Default)]
pub struct GoogleArgs {
    /// Static OAuth access token; the metadata server is used when absent
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true, value_name = "TOKEN")]
    pub access_token: Option<String>,

    /// Pub/Sub emulator as host:port; disables authentication
    #[arg(long, env = "PUBSUB_EMULATOR_HOST", value_name = "HOST:PORT")]
    pub pubsub_emulator_host: Option<String>,

    /// Pub/Sub API endpoint
    #[arg(long, value_name = "URL")]
    pub pubsub_endpoint: Option<String>,

    /// Secret Manager API endpoint
    #[arg(long, value_name = "URL")]
    pub secret_manager_endpoint: Option<String>,

    /// Metadata server token endpoint
    #[arg(long, value_name = "URL", hide = true)]
    pub metadata_token_url: Option<String>,
}

impl GoogleArgs {
    pub fn credentials(&self, client: &reqwest::Client) -> Credentials {
        if let Some(token) = self.access_token.as_ref().filter(|t| !t.is_empty()) {
            return Credentials::Static(token.clone());
        }

        if self.emulator_host().is_some() {
            return Credentials::Anonymous;
        }

        let url = self.metadata_token_url.as_deref().unwrap_or(METADATA_TOKEN_URL);
        Credentials::Metadata(MetadataTokenSource::new(client.clone(), url))
    }

    #[must_use]
    pub fn pubsub_endpoint(&self) -> String {
        if let Some(endpoint) = &self.pubsub_endpoint {
            return endpoint.clone();
        }

        self.emulator_host()
            .map_or_else(|| PUBSUB_ENDPOINT.to_string(), |host| format!("http://{host}"))
    }

    #[must_use]
    pub fn secret_manager_endpoint(&self) -> &str {
        self.secret_manager_endpoint.as_deref().unwrap_or(SECRET_MANAGER_ENDPOINT)
    }

    fn emulator_host(&self) -> Option<&str> {
        self.pubsub_emulator_host.as_deref().filter(|h| !h.trim().is_empty())
    }
}

pub fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().user_agent(USER_AGENT).build()?)
}

/// Loads the configuration file, merges the command line over it and resolves secrets
pub async fn load_settings(pipeline: &PipelineArgs, google: &GoogleArgs, client: &reqwest::Client, credentials: Arc<Credentials>) -> Result<Settings> {
    let config = Config::load(pipeline.config.as_deref())?;
    let mut settings = Settings::merge(pipeline, config);

    let secrets = SecretManager::new(client.clone(), google.secret_manager_endpoint(), credentials);
    settings.resolve_secrets(&secrets).await?;

    Ok(settings)
}

pub fn init_logging(log_level: LogLevel) {
    let level = match log_level {
        LogLevel::None => return,
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);

    // A second initialization, as happens when tests run several commands, is harmless.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .format_module_path(false)
        .format_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token_wins() {
        let args = GoogleArgs {
            access_token: Some("abc".to_string()),
            pubsub_emulator_host: Some("localhost:8085".to_string()),
            ..GoogleArgs::default()
        };
        assert!(matches!(args.credentials(&reqwest::Client::new()), Credentials::Static(t) if t == "abc"));
    }

    #[test]
    fn test_emulator_is_anonymous() {
        let args = GoogleArgs {
            pubsub_emulator_host: Some("localhost:8085".to_string()),
            ..GoogleArgs::default()
        };
        assert!(matches!(args.credentials(&reqwest::Client::new()), Credentials::Anonymous));
        assert_eq!(args.pubsub_endpoint(), "http://localhost:8085");
    }

    #[test]
    fn test_defaults() {
        let args = GoogleArgs::default();
        assert!(matches!(args.credentials(&reqwest::Client::new()), Credentials::Metadata(_)));
        assert_eq!(args.pubsub_endpoint(), PUBSUB_ENDPOINT);
        assert_eq!(args.secret_manager_endpoint(), SECRET_MANAGER_ENDPOINT);
    }

    #[test]
    fn test_explicit_endpoint_wins_over_emulator() {
        let args = GoogleArgs {
            pubsub_emulator_host: Some("localhost:8085".to_string()),
            pubsub_endpoint: Some("http://proxy:1234".to_string()),
            ..GoogleArgs::default()
        };
        assert_eq!(args.pubsub_endpoint(), "http://proxy:1234");
    }
}
