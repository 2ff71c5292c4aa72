//! Publishing through the Pub/Sub REST API

use super::token::Credentials;
use super::{LOG_TARGET, PublishError, Publisher};
use crate::Result;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use ohno::{IntoAppError, app_err, bail};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Production Pub/Sub endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com";

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    messages: [OutgoingMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct OutgoingMessage<'a> {
    data: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

/// Publishes each payload as one message on a Pub/Sub topic.
#[derive(Debug, Clone)]
pub struct PubsubPublisher {
    client: reqwest::Client,
    topic: String,
    publish_url: String,
    credentials: Arc<Credentials>,
}

impl PubsubPublisher {
    /// Creates a publisher for `topic`.
    ///
    /// A short topic name is qualified with `project`; a name that is already of the form
    /// `projects/<project>/topics/<topic>` is used as is.
    pub fn new(client: reqwest::Client, endpoint: &str, project: Option<&str>, topic: &str, credentials: Arc<Credentials>) -> Result<Self> {
        let topic = qualify_topic(project, topic)?;
        let publish_url = format!("{}/v1/{topic}:publish", endpoint.trim_end_matches('/'));

        Ok(Self {
            client,
            topic,
            publish_url,
            credentials,
        })
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    async fn send(&self, payload: &[u8]) -> Result<Option<String>> {
        let data = STANDARD.encode(payload);
        let body = PublishRequest {
            messages: [OutgoingMessage { data: &data }],
        };

        let request = self.credentials.authorize(self.client.post(&self.publish_url)).await?;
        let response = request
            .json(&body)
            .send()
            .await
            .into_app_err_with(|| format!("unable to reach Pub/Sub for topic '{}'", self.topic))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("Pub/Sub rejected the message for topic '{}': HTTP {status} {}", self.topic, detail.trim());
        }

        let ack: PublishResponse = response.json().await.into_app_err("malformed Pub/Sub publish response")?;
        Ok(ack.message_ids.into_iter().next())
    }
}

impl Publisher for PubsubPublisher {
    async fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        let message_id = self.send(&payload).await?;
        log::debug!(
            target: LOG_TARGET,
            "Published {} bytes to '{}' as message {}",
            payload.len(),
            self.topic,
            message_id.as_deref().unwrap_or("<unknown>")
        );
        Ok(())
    }
}

/// Expands a short topic name into its full resource name.
pub fn qualify_topic(project: Option<&str>, topic: &str) -> Result<String> {
    let topic = topic.trim();
    if topic.is_empty() {
        bail!("no Pub/Sub topic was configured");
    }

    if topic.starts_with("projects/") {
        return Ok(topic.to_string());
    }

    let project = project
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| app_err!("a project is required to publish to topic '{topic}'"))?;

    Ok(format!("projects/{}/topics/{topic}", project.trim()))
}
