#![deny(missing_docs)]
//! Incremental SSE delta reader for the TripMate AI chat endpoint.
//!
//! The backend answers a chat request with a chunked body of server-sent
//! event lines:
//!
//! ```text
//! : keep-alive
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//! data: [DONE]
//! ```
//!
//! [`ChatStreamClient`] issues the request and turns the body into an
//! ordered sequence of [`StreamEvent`]s ending in exactly one terminal event
//! (`Done` or `Error`). Chunk boundaries may fall anywhere, including inside
//! a JSON payload or a multi-byte character; only complete lines are parsed.
//! Cancellation through a [`CancellationToken`] always resolves as `Done`.
//!
//! Results can be consumed as a stream ([`ChatStreamClient::stream`]) or
//! through a [`StreamObserver`] ([`ChatStreamClient::run_stream`]).

mod client;
mod config;
mod conversation;
mod error;
pub mod frame;
mod lines;
mod observer;
mod store;
mod streaming;
mod types;

pub use client::ChatStreamClient;
pub use config::{
    BACKEND_URL_VAR, ChatStreamConfig, DEFAULT_BASE_URL, DEFAULT_FUNCTION_PATH,
    PUBLISHABLE_KEY_VAR,
};
pub use conversation::{
    Conversation, ConversationError, DEFAULT_SEND_COOLDOWN, SendCanceller, TurnOutcome,
};
pub use error::{ChatStreamError, ConfigError, TranscriptError};
pub use lines::LineBuffer;
pub use observer::{Callbacks, StreamObserver, TurnAccumulator, drive};
pub use store::{InMemoryTurnStore, StoreError, TurnStore};
pub use streaming::parse_delta_stream;
pub use types::{
    ChatMessage, ChatRequest, MAX_MESSAGE_LENGTH, MAX_MESSAGES, Role, StreamEvent, StreamHandle,
};

pub use tokio_util::sync::CancellationToken;
