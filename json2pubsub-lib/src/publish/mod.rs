//! Delivery of message payloads.
//!
//! The pipeline only depends on the [`Publisher`] trait. [`PubsubPublisher`] talks to the
//! Pub/Sub REST API, [`DryRunPublisher`] only logs, and [`MemoryPublisher`] records payloads
//! so tests and local experiments can inspect them.

mod memory;
mod pubsub;
pub mod token;

pub use memory::MemoryPublisher;
pub use pubsub::{DEFAULT_ENDPOINT, PubsubPublisher, qualify_topic};

use bytes::Bytes;
use core::fmt::{Display, Formatter};
use core::future::Future;

const LOG_TARGET: &str = "   publish";

/// User agent sent with every request to Google APIs.
pub const USER_AGENT: &str = concat!("json2pubsub/", env!("CARGO_PKG_VERSION"));

/// Something that accepts message payloads for delivery.
///
/// Implementations must be safe to call from many request tasks at once.
pub trait Publisher: Send + Sync + 'static {
    /// Delivers `payload` as one message. Resolves once the message is acknowledged.
    fn publish(&self, payload: Bytes) -> impl Future<Output = Result<(), PublishError>> + Send;
}

/// Failure to deliver a message.
#[derive(Debug)]
pub struct PublishError {
    message: String,
}

impl PublishError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.message)
    }
}

impl core::error::Error for PublishError {}

impl From<ohno::AppError> for PublishError {
    // `Display` on `AppError` carries the captured backtrace and enrichment trail
    fn from(e: ohno::AppError) -> Self {
        Self::new(e.message())
    }
}

/// Logs payloads instead of publishing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunPublisher;

impl Publisher for DryRunPublisher {
    async fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        log::info!(target: LOG_TARGET, "Dry run, not publishing: {}", String::from_utf8_lossy(&payload));
        Ok(())
    }
}

/// The publisher chosen at startup.
#[derive(Debug)]
pub enum ConfiguredPublisher {
    Pubsub(PubsubPublisher),
    DryRun(DryRunPublisher),
}

impl Publisher for ConfiguredPublisher {
    async fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        match self {
            Self::Pubsub(publisher) => publisher.publish(payload).await,
            Self::DryRun(publisher) => publisher.publish(payload).await,
        }
    }
}
