//! Server-Sent Events (SSE) processing for streaming responses.
//!
//! `streamGenerateContent?alt=sse` answers with a sequence of `data:` events,
//! each carrying one JSON [`GenerateContentResponse`] chunk. This module turns
//! the raw byte stream into a stream of those chunks.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::types::{ApiErrorBody, GenerateContentResponse};
use crate::{Error, Result};

/// Process a stream of bytes into a stream of response chunks.
///
/// Events may be split across reads or share one read; the parser buffers
/// until it sees a blank line. An in-band `{"error": ...}` event becomes an
/// `Err` item.
pub fn process_sse<S>(byte_stream: S) -> impl Stream<Item = Result<GenerateContentResponse>>
where
    S: Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Unpin + 'static,
{
    let stream = byte_stream.map(|result| {
        result
            .map_err(|e| Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e))))
    });

    let buffer: Vec<u8> = Vec::new();

    stream::unfold(
        (stream, buffer),
        move |(mut stream, mut buffer)| async move {
            loop {
                if let Some(event) = extract_event(&mut buffer) {
                    match event {
                        Some(event) => return Some((event, (stream, buffer))),
                        None => continue,
                    }
                }

                match stream.next().await {
                    // `\r` never appears inside JSON payloads, so dropping it
                    // normalizes CRLF even when the pair straddles two reads.
                    Some(Ok(bytes)) => buffer.extend(bytes.iter().filter(|&&b| b != b'\r')),
                    Some(Err(e)) => {
                        return Some((Err(e), (stream, buffer)));
                    }
                    None => {
                        // A final event may lack its trailing blank line.
                        let tail = std::mem::take(&mut buffer);
                        if tail.iter().all(u8::is_ascii_whitespace) {
                            return None;
                        }
                        return decode_event(&tail).map(|event| (event, (stream, buffer)));
                    }
                }
            }
        },
    )
}

/// Split one complete event off the front of `buffer`.
///
/// Events are delimited at the byte level so that a multi-byte character
/// split across reads is only decoded once the whole event has arrived.
/// Returns `None` when no complete event is buffered yet; `Some(None)` for an
/// event that carries no data (comments, keep-alives).
fn extract_event(buffer: &mut Vec<u8>) -> Option<Option<Result<GenerateContentResponse>>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let event: Vec<u8> = buffer.drain(..end + 2).collect();
    Some(decode_event(&event[..end]))
}

fn decode_event(event: &[u8]) -> Option<Result<GenerateContentResponse>> {
    match std::str::from_utf8(event) {
        Ok(text) => parse_event(text),
        Err(e) => Some(Err(Error::encoding(
            format!("Invalid UTF-8 in stream: {e}"),
            Some(Box::new(e)),
        ))),
    }
}

fn parse_event(event_text: &str) -> Option<Result<GenerateContentResponse>> {
    let mut data = String::new();
    for line in event_text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let Some(payload) = line.strip_prefix("data:") else {
            // `event:`, `id:`, and `retry:` fields carry nothing we use.
            if line.starts_with("event:") || line.starts_with("id:") || line.starts_with("retry:") {
                continue;
            }
            return Some(Err(Error::serialization(
                format!("Malformed SSE event: unexpected line '{line}'"),
                None,
            )));
        };
        if !data.is_empty() {
            data.push('\n');
        }
        data.push_str(payload.strip_prefix(' ').unwrap_or(payload));
    }
    if data.trim().is_empty() {
        return None;
    }
    Some(parse_chunk(&data))
}

fn parse_chunk(data: &str) -> Result<GenerateContentResponse> {
    let value: serde_json::Value = serde_json::from_str(data)?;
    if value.get("error").is_some() {
        let body: ApiErrorBody = serde_json::from_value(value)?;
        return Err(Error::api(
            body.error.code,
            body.error.status,
            body.error.message,
        ));
    }
    Ok(serde_json::from_value(value)?)
}
