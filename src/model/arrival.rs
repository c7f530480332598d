use serde::{Deserialize, Serialize};
use url::Url;

/// Event-kind marker every accepted notification must carry (compared
/// case-insensitively, as a substring of `eventType`).
pub const BLOB_CREATED_MARKER: &str = "BlobCreate";

/// Notification published when an audio file lands in blob storage.
///
/// Queue: `START_TRANSCRIPTION_QUEUE`
///
/// The payload is an Event Grid blob event with one extra field, the retry
/// counter, appended by this service when it re-queues a notification.
/// Fields this service does not interpret are kept in `extra` so a re-queued
/// notification is byte-for-byte the same event apart from the counter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileArrivalMessage {
    /// e.g. `Microsoft.Storage.BlobCreated`.
    pub event_type: String,

    pub data: BlobEventData,

    /// Number of times this notification has been re-queued. Starts at 0.
    #[serde(default, alias = "RetryCount")]
    pub retry_count: u32,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The `data` object of a blob event. Only the URL matters here.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BlobEventData {
    pub url: Url,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("message body is not a valid notification: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
}

impl FileArrivalMessage {
    pub fn decode(body: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(body).map_err(CodecError::Decode)
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    /// The audio file URL with fragment stripped, used for de-duplication.
    pub fn absolute_url(&self) -> String {
        let mut url = self.data.url.clone();
        url.set_fragment(None);
        url.to_string()
    }

    pub fn is_blob_created(&self) -> bool {
        self.event_type
            .to_ascii_lowercase()
            .contains(&BLOB_CREATED_MARKER.to_ascii_lowercase())
    }

    /// A copy of this notification carrying the next retry count.
    /// The counter saturates instead of wrapping.
    pub fn next_attempt(&self) -> Self {
        let mut next = self.clone();
        next.retry_count = self.retry_count.saturating_add(1);
        next
    }
}
