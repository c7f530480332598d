/// How a failed submission should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network trouble, timeouts, 5xx: retry with backoff until the limit.
    Transient,
    /// The service asked us to slow down: always retry.
    Throttled,
    /// The request itself is bad: dead-letter without retrying.
    Permanent,
}

impl FailureKind {
    pub fn is_throttled(self) -> bool {
        self == Self::Throttled
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("transcription request timed out: {0}")]
    Timeout(String),

    #[error("could not reach transcription service: {0}")]
    Connection(String),

    #[error("transcription service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed transcription response: {0}")]
    MalformedResponse(String),

    #[error("invalid transcription request: {0}")]
    InvalidRequest(String),
}

/// HTTP statuses worth retrying. 429 is additionally marked as throttling.
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

impl SubmitError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) | Self::Connection(_) => FailureKind::Transient,
            Self::Status { status: 429, .. } => FailureKind::Throttled,
            Self::Status { status, .. } if is_retryable_status(*status) => FailureKind::Transient,
            Self::Status { .. } | Self::MalformedResponse(_) | Self::InvalidRequest(_) => {
                FailureKind::Permanent
            }
        }
    }
}

impl From<reqwest::Error> for SubmitError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else if let Some(status) = e.status() {
            Self::Status {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            Self::Connection(e.to_string())
        }
    }
}
