//! Callback-style consumption of a streamed reply.

use futures::StreamExt;

use crate::error::ChatStreamError;
use crate::types::{ChatMessage, StreamEvent, StreamHandle};

/// Receives the events of one chat stream session.
///
/// [`drive`] calls `on_delta` zero or more times in stream order, then
/// exactly one of `on_done` or `on_error`, and nothing afterwards.
pub trait StreamObserver {
    /// A new fragment of assistant text.
    fn on_delta(&mut self, text: &str);

    /// The reply finished, including by cancellation.
    fn on_done(&mut self);

    /// The session failed.
    fn on_error(&mut self, error: ChatStreamError);
}

impl<T: StreamObserver + ?Sized> StreamObserver for &mut T {
    fn on_delta(&mut self, text: &str) {
        (**self).on_delta(text);
    }

    fn on_done(&mut self) {
        (**self).on_done();
    }

    fn on_error(&mut self, error: ChatStreamError) {
        (**self).on_error(error);
    }
}

/// Consume a [`StreamHandle`] into an observer.
///
/// Returns once the terminal callback has fired. A stream that ends without
/// a terminal event is reported as done so the observer always sees exactly
/// one terminal callback.
pub async fn drive<O: StreamObserver + ?Sized>(mut handle: StreamHandle, observer: &mut O) {
    while let Some(event) = handle.receiver.next().await {
        match event {
            StreamEvent::Delta(text) => observer.on_delta(&text),
            StreamEvent::Done => {
                observer.on_done();
                return;
            }
            StreamEvent::Error(err) => {
                observer.on_error(err);
                return;
            }
        }
    }
    observer.on_done();
}

/// Adapts three closures into a [`StreamObserver`].
///
/// ```
/// use tripmate_stream::Callbacks;
///
/// let mut reply = String::new();
/// let mut observer = Callbacks::new(
///     |delta: &str| reply.push_str(delta),
///     || println!("done"),
///     |err| eprintln!("chat failed: {err}"),
/// );
/// # let _ = &mut observer;
/// ```
pub struct Callbacks<D, F, E> {
    on_delta: D,
    on_done: Option<F>,
    on_error: Option<E>,
}

impl<D, F, E> Callbacks<D, F, E>
where
    D: FnMut(&str),
    F: FnOnce(),
    E: FnOnce(ChatStreamError),
{
    /// Wrap the three callbacks.
    pub fn new(on_delta: D, on_done: F, on_error: E) -> Self {
        Self {
            on_delta,
            on_done: Some(on_done),
            on_error: Some(on_error),
        }
    }
}

impl<D, F, E> StreamObserver for Callbacks<D, F, E>
where
    D: FnMut(&str),
    F: FnOnce(),
    E: FnOnce(ChatStreamError),
{
    fn on_delta(&mut self, text: &str) {
        (self.on_delta)(text);
    }

    fn on_done(&mut self) {
        if let Some(f) = self.on_done.take() {
            f();
        }
    }

    fn on_error(&mut self, error: ChatStreamError) {
        if let Some(f) = self.on_error.take() {
            f(error);
        }
    }
}

/// Collects the growing assistant reply for display.
///
/// The transcript sent to the backend is never touched; this is the
/// display-layer copy that grows with every delta.
#[derive(Debug, Default)]
pub struct TurnAccumulator {
    text: String,
    deltas: usize,
    finished: bool,
    error: Option<ChatStreamError>,
}

impl TurnAccumulator {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Text received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Number of deltas received.
    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    /// Whether a terminal callback has fired.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The failure, if the session ended with one.
    pub fn error(&self) -> Option<&ChatStreamError> {
        self.error.as_ref()
    }

    /// Take the failure out of the accumulator.
    pub fn take_error(&mut self) -> Option<ChatStreamError> {
        self.error.take()
    }

    /// The reply as an assistant message, or `None` when no text arrived.
    pub fn into_message(self) -> Option<ChatMessage> {
        (!self.text.is_empty()).then(|| ChatMessage::assistant(self.text))
    }
}

impl StreamObserver for TurnAccumulator {
    fn on_delta(&mut self, text: &str) {
        self.deltas += 1;
        self.text.push_str(text);
    }

    fn on_done(&mut self) {
        self.finished = true;
    }

    fn on_error(&mut self, error: ChatStreamError) {
        self.finished = true;
        self.error = Some(error);
    }
}
