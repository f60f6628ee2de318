//! Error types and HTTP/reqwest error mapping.

use thiserror::Error;
use tripmate_auth::AuthError;

/// Why a chat stream session failed.
///
/// Every variant is terminal for its session and the reader never retries.
/// Cancellation is not an error and never appears here.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ChatStreamError {
    /// No usable bearer credential before the request was issued.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// HTTP 429 from the backend.
    #[error("rate limit exceeded, please wait a moment before sending another message")]
    RateLimited,

    /// HTTP 402 from the backend.
    #[error("AI credits exhausted, please contact support")]
    QuotaExhausted,

    /// Any other non-success status.
    #[error("request failed with status {status}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
    },

    /// Success status without a readable body.
    #[error("no response body")]
    EmptyBody,

    /// Network or decode failure while issuing the request or streaming.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ChatStreamError {
    /// Whether a fresh session might succeed later.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited | Self::Transport(_) => true,
            Self::RequestFailed { status } => *status >= 500,
            _ => false,
        }
    }
}

impl From<AuthError> for ChatStreamError {
    fn from(err: AuthError) -> Self {
        Self::Authentication(err.to_string())
    }
}

/// Errors loading [`ChatStreamConfig`](crate::ChatStreamConfig).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    /// The backend URL does not parse as an absolute http(s) URL.
    #[error("invalid backend url {url:?}: {reason}")]
    InvalidUrl {
        /// The rejected value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// A transcript that breaks the backend's request limits.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// No messages to send.
    #[error("transcript is empty")]
    Empty,

    /// Too many messages in one request.
    #[error("maximum {max} messages allowed, got {count}")]
    TooManyMessages {
        /// Messages in the request.
        count: usize,
        /// Backend limit.
        max: usize,
    },

    /// One message is too long.
    #[error("message {index} exceeds maximum length of {max} characters ({length})")]
    MessageTooLong {
        /// Position in the transcript.
        index: usize,
        /// Measured length.
        length: usize,
        /// Backend limit.
        max: usize,
    },
}

/// Map a non-success HTTP status to a [`ChatStreamError`].
pub(crate) fn map_http_status(status: reqwest::StatusCode) -> ChatStreamError {
    match status.as_u16() {
        429 => ChatStreamError::RateLimited,
        402 => ChatStreamError::QuotaExhausted,
        code => ChatStreamError::RequestFailed { status: code },
    }
}

/// Map a [`reqwest::Error`] to a [`ChatStreamError`].
pub(crate) fn map_reqwest_error(err: reqwest::Error) -> ChatStreamError {
    ChatStreamError::Transport(Box::new(err))
}
