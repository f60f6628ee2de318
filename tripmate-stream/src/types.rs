//! Wire types for the chat endpoint and the events produced by the reader.

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::{ChatStreamError, TranscriptError};

/// Maximum number of messages the backend accepts per request.
pub const MAX_MESSAGES: usize = 20;

/// Maximum length of a single message, in UTF-16 code units.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The traveller.
    User,
    /// The AI assistant.
    Assistant,
}

/// One message of the transcript sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who wrote the message.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A message written by the user.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// A message written by the assistant.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of the streaming chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    /// Transcript, oldest first.
    pub messages: Vec<ChatMessage>,
    /// Conversation the turn is attributed to.
    #[serde(rename = "conversationId")]
    pub conversation_id: String,
}

impl ChatRequest {
    /// Build a request for the given transcript and conversation.
    pub fn new(messages: Vec<ChatMessage>, conversation_id: impl Into<String>) -> Self {
        Self {
            messages,
            conversation_id: conversation_id.into(),
        }
    }

    /// Check the transcript against the backend's limits.
    ///
    /// The reader never calls this; honouring the limits is the caller's job.
    pub fn validate(&self) -> Result<(), TranscriptError> {
        if self.messages.is_empty() {
            return Err(TranscriptError::Empty);
        }
        if self.messages.len() > MAX_MESSAGES {
            return Err(TranscriptError::TooManyMessages {
                count: self.messages.len(),
                max: MAX_MESSAGES,
            });
        }
        for (index, message) in self.messages.iter().enumerate() {
            // The backend measures JavaScript string length.
            let length = message.content.encode_utf16().count();
            if length > MAX_MESSAGE_LENGTH {
                return Err(TranscriptError::MessageTooLong {
                    index,
                    length,
                    max: MAX_MESSAGE_LENGTH,
                });
            }
        }
        Ok(())
    }
}

/// An event emitted while reading a streamed reply.
///
/// Every stream ends with exactly one terminal event: [`StreamEvent::Done`]
/// or [`StreamEvent::Error`].
#[derive(Debug)]
pub enum StreamEvent {
    /// Incremental assistant text, in stream order. Never empty.
    Delta(String),
    /// The reply finished (sentinel, end of body, or cancellation).
    Done,
    /// The session failed.
    Error(ChatStreamError),
}

impl StreamEvent {
    /// Whether this event ends the session.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Delta(_))
    }
}

/// Handle to a streamed reply.
pub struct StreamHandle {
    /// The stream of events. Consume with `StreamExt::next()`.
    pub receiver: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>,
}

impl std::fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamHandle").finish_non_exhaustive()
    }
}
