use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use url::Url;
use uuid::Uuid;

/// Description attached to every job submitted by the drain cycle.
pub const JOB_DESCRIPTION: &str = "StartByTimerTranscription";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProfanityFilterMode {
    None,
    Removed,
    Tags,
    Masked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PunctuationMode {
    None,
    Dictated,
    Automatic,
    DictatedAndAutomatic,
}

/// Returned when a mode string matches no known variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMode(pub String);

impl fmt::Display for UnknownMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown mode '{}'", self.0)
    }
}

impl std::error::Error for UnknownMode {}

impl FromStr for ProfanityFilterMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "removed" => Ok(Self::Removed),
            "tags" => Ok(Self::Tags),
            "masked" => Ok(Self::Masked),
            _ => Err(UnknownMode(s.to_owned())),
        }
    }
}

impl FromStr for PunctuationMode {
    type Err = UnknownMode;

    /// Whitespace is ignored: `"Dictated And Automatic"` is accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_lowercase();

        match compact.as_str() {
            "none" => Ok(Self::None),
            "dictated" => Ok(Self::Dictated),
            "automatic" => Ok(Self::Automatic),
            "dictatedandautomatic" => Ok(Self::DictatedAndAutomatic),
            _ => Err(UnknownMode(s.to_owned())),
        }
    }
}

/// Per-job recognition options, copied from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionProperties {
    pub profanity_filter_mode: ProfanityFilterMode,
    pub punctuation_mode: PunctuationMode,
    pub diarization_enabled: bool,
    pub word_level_timestamps_enabled: bool,
}

/// A batch transcription job as handed to [`super::TranscriptionService`].
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptionDefinition {
    pub display_name: String,
    pub description: String,
    pub locale: String,
    pub content_urls: Vec<Url>,
    pub properties: TranscriptionProperties,
    /// Custom model to transcribe with instead of the base model.
    pub model: Option<Uuid>,
}

/// A configured custom model is only used when it is a well-formed UUID.
pub fn parse_model_id(raw: Option<&str>) -> Option<Uuid> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| Uuid::parse_str(s).ok())
}
