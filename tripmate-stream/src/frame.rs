//! Classification of individual SSE lines and delta extraction.
//!
//! A line is one of:
//!
//! - blank, or a comment starting with `:`: ignored;
//! - `data: [DONE]`: the end-of-reply sentinel;
//! - `data: <json>`: a chunk that may carry a text delta at
//!   `choices[0].delta.content`;
//! - anything else (`event:`, `id:`, `retry:`, ...): ignored.

/// Prefix of a data line, including the single space the backend emits.
pub const DATA_PREFIX: &[u8] = b"data: ";

/// Payload marking the end of the reply.
pub const DONE_SENTINEL: &[u8] = b"[DONE]";

/// What a single line means to the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Blank line, comment, or a field the reader does not use.
    Skip,
    /// The `[DONE]` sentinel.
    Done,
    /// A data payload, prefix stripped and trimmed. Not yet decoded.
    Data(&'a [u8]),
}

/// Classify one raw line (without its line terminator).
///
/// Works on bytes so that lines the reader ignores are never decoded.
pub fn classify(line: &[u8]) -> Frame<'_> {
    if line.trim_ascii().is_empty() || line.first() == Some(&b':') {
        return Frame::Skip;
    }
    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return Frame::Skip;
    };
    let payload = rest.trim_ascii();
    if payload == DONE_SENTINEL {
        Frame::Done
    } else {
        Frame::Data(payload)
    }
}

/// Extract the text delta from a data payload.
///
/// Returns `Ok(None)` for valid JSON without a non-empty string at
/// `choices[0].delta.content` (role-only chunks, usage chunks, other shapes).
pub fn extract_delta(payload: &str) -> Result<Option<String>, serde_json::Error> {
    let json: serde_json::Value = serde_json::from_str(payload)?;
    Ok(json["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|content| !content.is_empty())
        .map(str::to_owned))
}
