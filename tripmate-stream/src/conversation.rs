//! Conversation driver: transcript, send cooldown, and turn persistence.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::client::ChatStreamClient;
use crate::error::{ChatStreamError, TranscriptError};
use crate::observer::{StreamObserver, TurnAccumulator, drive};
use crate::store::TurnStore;
use crate::types::{ChatMessage, ChatRequest, MAX_MESSAGES};

/// Minimum gap between two sends in one conversation.
pub const DEFAULT_SEND_COOLDOWN: Duration = Duration::from_secs(2);

/// Errors raised before a session is started.
///
/// Failures of the session itself reach the observer through `on_error`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConversationError {
    /// The previous send was too recent.
    #[error("sending too quickly, retry in {retry_in:?}")]
    Cooldown {
        /// Time left until the next send is allowed.
        retry_in: Duration,
    },

    /// The outgoing transcript breaks the backend's limits.
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

/// How a send ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply completed (or was cancelled) with some text.
    Replied {
        /// Full assistant text.
        reply: String,
        /// Whether the turn store accepted the exchange.
        persisted: bool,
    },
    /// The reply completed without any text. Nothing was recorded.
    NoReply,
    /// The session failed; the observer received the error.
    Failed,
}

/// Cancels the send a [`Conversation`] currently has in flight.
///
/// Obtained from [`Conversation::canceller`]. Clones share one slot, so a
/// handle moved into another task can stop a send that is still streaming.
/// Cancelling resolves the send as done, never as an error.
#[derive(Debug, Clone, Default)]
pub struct SendCanceller {
    slot: Arc<Mutex<ActiveSend>>,
}

#[derive(Debug, Default)]
struct ActiveSend {
    next_id: u64,
    current: Option<(u64, CancellationToken)>,
}

impl SendCanceller {
    /// Cancel the in-flight send. Returns `false` when nothing was running.
    pub fn cancel(&self) -> bool {
        match self.lock().current.take() {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Whether a send is registered as in flight.
    pub fn is_active(&self) -> bool {
        self.lock().current.is_some()
    }

    /// Register `token` as the in-flight send, cancelling any previous one.
    fn begin(&self, token: CancellationToken) -> u64 {
        let mut slot = self.lock();
        if let Some((_, previous)) = slot.current.take() {
            previous.cancel();
        }
        let id = slot.next_id;
        slot.next_id += 1;
        slot.current = Some((id, token));
        id
    }

    /// Clear the slot if it still holds send `id`.
    fn finish(&self, id: u64) {
        let mut slot = self.lock();
        if slot.current.as_ref().is_some_and(|(current, _)| *current == id) {
            slot.current = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, ActiveSend> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One chat conversation against the streaming endpoint.
///
/// Keeps the transcript that is sent with every request, cancels the
/// previous session before starting a new one, and records an exchange
/// (locally and in the [`TurnStore`]) only after the assistant turn is done.
pub struct Conversation {
    id: String,
    client: ChatStreamClient,
    store: Arc<dyn TurnStore>,
    transcript: Vec<ChatMessage>,
    cooldown: Duration,
    last_send: Option<Instant>,
    canceller: SendCanceller,
}

impl Conversation {
    /// Start an empty conversation.
    pub fn new(id: impl Into<String>, client: ChatStreamClient, store: Arc<dyn TurnStore>) -> Self {
        Self {
            id: id.into(),
            client,
            store,
            transcript: Vec::new(),
            cooldown: DEFAULT_SEND_COOLDOWN,
            last_send: None,
            canceller: SendCanceller::default(),
        }
    }

    /// Resume with previously saved messages.
    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.transcript = history;
        self
    }

    /// Override the send cooldown.
    #[must_use]
    pub fn send_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Conversation identifier sent with every request.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Messages exchanged so far, oldest first.
    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Handle for cancelling a running [`send`](Self::send) from elsewhere.
    pub fn canceller(&self) -> SendCanceller {
        self.canceller.clone()
    }

    /// Cancel the in-flight session, if any.
    pub fn cancel_active(&self) -> bool {
        self.canceller.cancel()
    }

    /// Send `text` and stream the reply into `observer`.
    ///
    /// Any send still registered as in flight (for example one whose future
    /// was dropped) is cancelled first. The send can be stopped while it runs
    /// through `cancel` or a [`SendCanceller`].
    ///
    /// Only the most recent [`MAX_MESSAGES`] messages are sent. On completion
    /// with text, the user message and the reply are appended to the
    /// transcript and saved; a failed save is logged and reported as
    /// `persisted: false`.
    pub async fn send<O: StreamObserver + ?Sized>(
        &mut self,
        text: impl Into<String>,
        observer: &mut O,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome, ConversationError> {
        let now = Instant::now();
        if let Some(last) = self.last_send {
            let elapsed = now.duration_since(last);
            if elapsed < self.cooldown {
                return Err(ConversationError::Cooldown {
                    retry_in: self.cooldown - elapsed,
                });
            }
        }

        let user = ChatMessage::user(text);
        let request = ChatRequest::new(self.outgoing(&user), self.id.clone());
        request.validate()?;

        self.last_send = Some(now);
        let send_id = self.canceller.begin(cancel.clone());

        let mut turn = Tee {
            inner: observer,
            acc: TurnAccumulator::new(),
            failed: false,
        };
        drive(self.client.stream(request, cancel), &mut turn).await;
        self.canceller.finish(send_id);

        if turn.failed {
            return Ok(TurnOutcome::Failed);
        }
        let Some(reply) = turn.acc.into_message() else {
            return Ok(TurnOutcome::NoReply);
        };

        let persisted = match self.store.save_turn(&self.id, &user, &reply).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(conversation_id = %self.id, error = %e, "failed to save chat turn");
                false
            }
        };
        let text = reply.content.clone();
        self.transcript.push(user);
        self.transcript.push(reply);

        Ok(TurnOutcome::Replied {
            reply: text,
            persisted,
        })
    }

    fn outgoing(&self, user: &ChatMessage) -> Vec<ChatMessage> {
        let keep = MAX_MESSAGES.saturating_sub(1);
        let start = self.transcript.len().saturating_sub(keep);
        let mut messages = self.transcript[start..].to_vec();
        messages.push(user.clone());
        messages
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("id", &self.id)
            .field("messages", &self.transcript.len())
            .field("cooldown", &self.cooldown)
            .finish_non_exhaustive()
    }
}

/// Forwards every callback to the caller while accumulating the reply.
struct Tee<'a, O: ?Sized> {
    inner: &'a mut O,
    acc: TurnAccumulator,
    failed: bool,
}

impl<O: StreamObserver + ?Sized> StreamObserver for Tee<'_, O> {
    fn on_delta(&mut self, text: &str) {
        self.acc.on_delta(text);
        self.inner.on_delta(text);
    }

    fn on_done(&mut self) {
        self.acc.on_done();
        self.inner.on_done();
    }

    fn on_error(&mut self, error: ChatStreamError) {
        tracing::debug!(error = %error, "chat turn failed");
        self.failed = true;
        self.inner.on_error(error);
    }
}
