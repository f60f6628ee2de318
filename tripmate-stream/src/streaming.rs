//! SSE delta parsing over a chunked response body.
//!
//! Reference: <https://html.spec.whatwg.org/multipage/server-sent-events.html>

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::ChatStreamError;
use crate::frame::{Frame, classify, extract_delta};
use crate::lines::LineBuffer;
use crate::types::StreamEvent;

/// Outcome of feeding one complete line to the reader.
enum LineOutcome {
    Skip,
    Delta(String),
    Done,
    Fatal(ChatStreamError),
}

fn process_line(line: &[u8]) -> LineOutcome {
    let payload = match classify(line) {
        Frame::Skip => return LineOutcome::Skip,
        Frame::Done => return LineOutcome::Done,
        Frame::Data(payload) => payload,
    };
    let payload = match std::str::from_utf8(payload) {
        Ok(payload) => payload,
        Err(e) => return LineOutcome::Fatal(ChatStreamError::Transport(Box::new(e))),
    };

    match extract_delta(payload) {
        Ok(Some(delta)) => LineOutcome::Delta(delta),
        Ok(None) => LineOutcome::Skip,
        Err(e) => {
            // Lines are only sliced once their newline arrived, so this is
            // a bad frame from upstream rather than a split chunk.
            tracing::warn!(error = %e, payload_len = payload.len(), "skipping malformed data frame");
            LineOutcome::Skip
        }
    }
}

/// Parse a raw byte stream into an ordered stream of [`StreamEvent`]s.
///
/// The returned stream yields zero or more `Delta` events followed by exactly
/// one terminal event, then ends:
///
/// - `[DONE]` yields `Done` immediately; anything buffered after it is
///   discarded.
/// - End of the byte stream flushes a final line that lacks its newline, then
///   yields `Done`.
/// - Cancellation yields `Done`. It is checked before every chunk and before
///   every line, so no delta follows an observed cancellation.
/// - A read error or a line that is not valid UTF-8 yields
///   `Error(Transport)`.
pub fn parse_delta_stream<S, E>(
    byte_stream: S,
    cancel: CancellationToken,
) -> impl Stream<Item = StreamEvent> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::stream! {
        let mut lines = LineBuffer::new();
        let mut bytes_stream = std::pin::pin!(byte_stream);
        let mut deltas = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = bytes_stream.next() => Some(chunk),
            };

            let chunk = match next {
                None => {
                    tracing::debug!(deltas, "stream cancelled by caller");
                    yield StreamEvent::Done;
                    return;
                }
                Some(None) => break,
                Some(Some(Err(e))) => {
                    tracing::debug!(error = %e, deltas, "stream read failed");
                    yield StreamEvent::Error(ChatStreamError::Transport(Box::new(e)));
                    return;
                }
                Some(Some(Ok(chunk))) => chunk,
            };

            lines.extend(&chunk);

            while let Some(line) = lines.next_line() {
                if cancel.is_cancelled() {
                    tracing::debug!(deltas, "stream cancelled by caller");
                    yield StreamEvent::Done;
                    return;
                }
                match process_line(&line) {
                    LineOutcome::Skip => {}
                    LineOutcome::Delta(delta) => {
                        deltas += 1;
                        yield StreamEvent::Delta(delta);
                    }
                    LineOutcome::Done => {
                        tracing::debug!(deltas, "received done sentinel");
                        yield StreamEvent::Done;
                        return;
                    }
                    LineOutcome::Fatal(err) => {
                        yield StreamEvent::Error(err);
                        return;
                    }
                }
            }
        }

        // End of body: the last line may be missing its newline.
        if let Some(rest) = lines.take_remainder() {
            if !cancel.is_cancelled() {
                match process_line(&rest) {
                    LineOutcome::Delta(delta) => {
                        deltas += 1;
                        yield StreamEvent::Delta(delta);
                    }
                    LineOutcome::Fatal(err) => {
                        yield StreamEvent::Error(err);
                        return;
                    }
                    LineOutcome::Skip | LineOutcome::Done => {}
                }
            }
        }

        tracing::debug!(deltas, "stream ended");
        yield StreamEvent::Done;
    }
}
