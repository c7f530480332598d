use serde::{Deserialize, Serialize};

use super::arrival::CodecError;

/// Hand-off published after a batch job was accepted by the transcription
/// service.
///
/// Queue: `FETCH_TRANSCRIPTION_QUEUE`
///
/// This is the only state shared with the status-polling stage. The service
/// publishes exactly one per submitted batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartedMessage {
    /// Job location returned by the transcription service.
    pub location: String,

    pub name: String,

    pub locale: String,

    pub uses_custom_model: bool,

    pub files: Vec<AudioFileInfo>,

    /// Number of status polls performed so far. Always 0 when published here.
    pub polling_counter: u32,

    /// Number of reported polling iterations. Always 0 when published here.
    pub iterations: u32,
}

/// One audio file inside a submitted job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFileInfo {
    pub url: String,

    /// Carried over from the arrival notification.
    pub retry_count: u32,

    /// Filled in by later stages; always `null` here.
    pub analytics_requests: Option<serde_json::Value>,

    pub file_name: String,
}

impl JobStartedMessage {
    pub fn new(
        location: String,
        name: String,
        locale: String,
        uses_custom_model: bool,
        files: Vec<AudioFileInfo>,
    ) -> Self {
        Self {
            location,
            name,
            locale,
            uses_custom_model,
            files,
            polling_counter: 0,
            iterations: 0,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(CodecError::Encode)
    }

    pub fn decode(body: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(body).map_err(CodecError::Decode)
    }
}

impl AudioFileInfo {
    pub fn new(url: String, retry_count: u32, file_name: String) -> Self {
        Self {
            url,
            retry_count,
            analytics_requests: None,
            file_name,
        }
    }
}
