use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A notification received from the input queue, still owned by the queue.
///
/// `delivery_tag`, `session` and `locked_until` belong to the transport: the
/// controller only reads them, hands the message back for ack/renew/release,
/// and never edits the body.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    pub delivery_tag: u64,
    /// Transport session that issued `delivery_tag`. Tags are meaningless
    /// once that session is gone.
    pub session: u64,
    pub body: Vec<u8>,
    /// Instant after which the queue may hand this delivery to someone else.
    pub locked_until: DateTime<Utc>,
}

impl ReceivedMessage {
    /// Time left on the lease relative to `now`; zero once expired.
    pub fn lease_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.locked_until - now).to_std().unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Ownership of the delivery was lost; the queue will redeliver it.
    #[error("lease lost for delivery {delivery_tag}")]
    LeaseLost { delivery_tag: u64 },
    #[error("queue connection error: {0}")]
    Connection(String),
    #[error("topology declaration failed: {0}")]
    Topology(String),
    #[error("receive failed: {0}")]
    Receive(String),
    #[error("acknowledge failed: {0}")]
    Acknowledge(String),
    #[error("publish failed: {0}")]
    Publish(String),
    #[error("queue operation timed out after {0:?}")]
    Timeout(Duration),
}

/// Write side of a queue. The downstream hand-off queue only needs this.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Publish `payload`, receivable only after `visibility_delay` elapses.
    async fn enqueue(&self, payload: Vec<u8>, visibility_delay: Duration) -> Result<(), QueueError>;
}

/// Input queue with at-least-once delivery and per-delivery leases.
#[async_trait]
pub trait MessageQueue: MessageSink {
    /// Receive up to `max_count` messages, waiting at most `timeout` for the
    /// first one. An empty vector means nothing arrived.
    async fn receive(
        &self,
        max_count: usize,
        timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, QueueError>;

    /// Extend the lease of `message`, updating `locked_until` in place.
    async fn renew_lease(&self, message: &mut ReceivedMessage) -> Result<(), QueueError>;

    /// Remove `message` from the queue for good.
    async fn acknowledge(&self, message: &ReceivedMessage) -> Result<(), QueueError>;

    /// Give up ownership of `message` without settling it, making it
    /// receivable again right away.
    async fn release(&self, message: &ReceivedMessage) -> Result<(), QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_remaining_saturates_at_zero() {
        let now = Utc::now();
        let msg = ReceivedMessage {
            delivery_tag: 1,
            session: 0,
            body: Vec::new(),
            locked_until: now - chrono::Duration::seconds(3),
        };
        assert_eq!(msg.lease_remaining(now), Duration::ZERO);

        let msg = ReceivedMessage { locked_until: now + chrono::Duration::seconds(30), ..msg };
        assert_eq!(msg.lease_remaining(now), Duration::from_secs(30));
    }
}
