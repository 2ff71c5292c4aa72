use super::{PublishError, Publisher};
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Records published payloads in memory.
///
/// Clones share the same record, so a test can keep one handle while the server owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryPublisher {
    messages: Arc<Mutex<Vec<Bytes>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent publishes fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Payloads published so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<Bytes> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Publisher for MemoryPublisher {
    async fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::new("publisher is configured to fail"));
        }

        self.messages.lock().unwrap_or_else(PoisonError::into_inner).push(payload);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_and_fails_on_demand() {
        let publisher = MemoryPublisher::new();
        let handle = publisher.clone();

        publisher.publish(Bytes::from_static(b"one")).await.unwrap();
        handle.set_failing(true);
        let _ = publisher.publish(Bytes::from_static(b"two")).await.unwrap_err();

        assert_eq!(handle.messages(), vec![Bytes::from_static(b"one")]);
    }
}
