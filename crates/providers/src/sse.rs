//! SSE decoding for streaming chat completions.
//!
//! - [`drain_data_lines`] pulls complete `data:` payloads out of a buffer
//! - [`sse_response_stream`] turns a response plus a payload parser into a
//!   `BoxStream`, stopping early when the request is cancelled

use crate::util::from_reqwest;
use ca_domain::cancel::CancelToken;
use ca_domain::error::{Error, Result};
use ca_domain::stream::{BoxStream, StreamEvent};

/// Extract complete `data:` payloads from an SSE buffer.
///
/// Events are delimited by a blank line (`\n\n` or `\r\n\r\n`). Only
/// `data:` lines are kept; `event:`, `id:` and `retry:` are ignored.
/// Consumed bytes are removed and a trailing partial event stays put.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    if buffer.contains('\r') {
        *buffer = buffer.replace("\r\n", "\n");
    }
    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos + 2).collect();
        for line in block.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Build a [`BoxStream`] from an SSE response and a parser for each
/// `data:` payload.
///
/// The stream flushes the buffer when the body closes, emits a fallback
/// `Done` if the parser never produced one, and ends with a `Canceled`
/// error if `cancel` fires first.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    cancel: CancelToken,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                chunk = response.chunk() => Some(chunk),
            };

            let finished = match next {
                None => {
                    yield Err(Error::Canceled("llm stream".into()));
                    return;
                }
                Some(Err(e)) => {
                    yield Err(from_reqwest(e));
                    return;
                }
                Some(Ok(Some(bytes))) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    false
                }
                Some(Ok(None)) => {
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                    }
                    true
                }
            };

            for data in drain_data_lines(&mut buffer) {
                for event in parse_data(&data) {
                    if matches!(&event, Ok(StreamEvent::Done { .. })) {
                        done_emitted = true;
                    }
                    yield event;
                }
            }

            if finished {
                break;
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}
