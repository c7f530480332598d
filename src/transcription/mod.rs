mod client;
mod error;
mod types;

use async_trait::async_trait;
use url::Url;

pub use client::SpeechBatchClient;
pub use error::{is_retryable_status, FailureKind, SubmitError};
pub use types::{
    parse_model_id, ProfanityFilterMode, PunctuationMode, TranscriptionDefinition,
    TranscriptionProperties, UnknownMode, JOB_DESCRIPTION,
};

/// External asynchronous transcription service.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    /// Create a batch job and return its location for later polling.
    async fn submit(&self, definition: &TranscriptionDefinition) -> Result<Url, SubmitError>;
}
