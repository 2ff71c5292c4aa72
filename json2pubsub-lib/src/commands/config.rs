use super::common::PipelineArgs;
use crate::Result;
use crate::secrets::{SecretSource, resolve, resolve_option};
use camino::Utf8Path;
use ohno::{IntoAppError, app_err, bail};
use serde::{Deserialize, Serialize};
use std::fs;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// Default location written by `init`
pub const DEFAULT_CONFIG_FILE: &str = "json2pubsub.toml";

pub const DEFAULT_HANDLER_PATH: &str = "/";

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Contents of a configuration file. Every field is optional.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Project used to qualify a short topic name
    pub project: Option<String>,

    /// Topic messages are published to
    pub topic: Option<String>,

    /// Path the webhook is mounted on
    pub handler_path: Option<String>,

    /// Largest accepted request body, in bytes
    pub max_body_bytes: Option<usize>,

    #[serde(default)]
    pub expressions: ExpressionsConfig,
}

/// The `[expressions]` table.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ExpressionsConfig {
    pub control: Option<String>,
    pub message: Option<String>,
    pub response: Option<String>,
}

impl Config {
    /// Load configuration from `path`, or return an empty configuration when no path is given
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: Option<&Utf8Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading json2pubsub configuration file '{path}'"))?;
        toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{path}'"))
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }
}

/// Effective settings after merging the command line over the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub project: Option<String>,
    pub topic: Option<String>,
    pub handler_path: String,
    pub max_body_bytes: usize,
    pub control: Option<String>,
    pub message: Option<String>,
    pub response: Option<String>,
}

impl Settings {
    /// Merges `args` over `config`. Empty values count as absent.
    #[must_use]
    pub fn merge(args: &PipelineArgs, config: Config) -> Self {
        fn pick(arg: Option<&String>, file: Option<String>) -> Option<String> {
            arg.cloned().or(file).filter(|v| !v.trim().is_empty())
        }

        Self {
            project: pick(args.project.as_ref(), config.project),
            topic: pick(args.topic.as_ref(), config.topic),
            handler_path: pick(args.handler_path.as_ref(), config.handler_path).unwrap_or_else(|| DEFAULT_HANDLER_PATH.to_string()),
            max_body_bytes: args.max_body_bytes.or(config.max_body_bytes).unwrap_or(DEFAULT_MAX_BODY_BYTES),
            control: pick(args.control_cel.as_ref(), config.expressions.control),
            message: pick(args.message_cel.as_ref(), config.expressions.message),
            response: pick(args.response_cel.as_ref(), config.expressions.response),
        }
    }

    /// Replaces `gsm:` references with their secret payloads
    ///
    /// # Errors
    ///
    /// Returns an error if a referenced secret cannot be read
    pub async fn resolve_secrets<S: SecretSource>(&mut self, source: &S) -> Result<()> {
        resolve_option(&mut self.topic, source).await?;
        self.handler_path = resolve(&self.handler_path, source).await?;
        resolve_option(&mut self.control, source).await?;
        resolve_option(&mut self.message, source).await?;
        resolve_option(&mut self.response, source).await?;
        Ok(())
    }

    /// Validate the merged settings
    ///
    /// # Errors
    ///
    /// Returns an error if a required value is missing or a value is out of range
    pub fn validate(&self, require_topic: bool) -> Result<()> {
        if self.control.is_none() {
            bail!("no control expression configured (set CONTROL_CEL, --control-cel or [expressions].control)");
        }

        if self.message.is_none() {
            bail!("no message expression configured (set MESSAGE_CEL, --message-cel or [expressions].message)");
        }

        if require_topic && self.topic.is_none() {
            bail!("no Pub/Sub topic configured (set PUBSUB_TOPIC, --topic or topic)");
        }

        if !self.handler_path.starts_with('/') {
            return Err(app_err!("handler path must start with '/', got '{}'", self.handler_path));
        }

        if self.max_body_bytes == 0 {
            bail!("max_body_bytes must be greater than zero");
        }

        Ok(())
    }

    /// The control expression; only valid after [`Settings::validate`] succeeded.
    #[must_use]
    pub fn control(&self) -> &str {
        self.control.as_deref().unwrap_or_default()
    }

    /// The message expression; only valid after [`Settings::validate`] succeeded.
    #[must_use]
    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}
