//! Logging hook for Gemini client operations.
//!
//! This module provides the [`ClientLogger`] trait that allows users to capture
//! every API interaction passing through the [`Gemini`](crate::Gemini) client,
//! and [`TracingLogger`], which forwards them to `tracing`.

use crate::types::{GenerateContentResponse, VideoOperation};

/// A trait for logging Gemini client operations.
///
/// Implement this trait to capture and record API interactions, including
/// streamed chunks and every poll of a video job.
///
/// # Example
///
/// ```rust,ignore
/// use novachat::{ClientLogger, GenerateContentResponse, VideoOperation};
/// use std::sync::Mutex;
///
/// struct Recorder {
///     endpoints: Mutex<Vec<String>>,
/// }
///
/// impl ClientLogger for Recorder {
///     fn log_request(&self, endpoint: &str) {
///         self.endpoints.lock().unwrap().push(endpoint.to_string());
///     }
///     fn log_response(&self, _: &GenerateContentResponse) {}
///     fn log_stream_chunk(&self, _: &GenerateContentResponse) {}
///     fn log_operation(&self, _: &VideoOperation) {}
/// }
/// ```
pub trait ClientLogger: Send + Sync {
    /// Called before each request with the endpoint path, relative to the
    /// base URL.
    fn log_request(&self, endpoint: &str);

    /// Log a complete response from a non-streaming call.
    fn log_response(&self, response: &GenerateContentResponse);

    /// Log one chunk of a streaming response.
    fn log_stream_chunk(&self, chunk: &GenerateContentResponse);

    /// Log the state of a video job after submission and after each poll.
    fn log_operation(&self, operation: &VideoOperation);
}

/// Emits every interaction as a `tracing` event at debug or trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl ClientLogger for TracingLogger {
    fn log_request(&self, endpoint: &str) {
        tracing::debug!(endpoint, "gemini request");
    }

    fn log_response(&self, response: &GenerateContentResponse) {
        tracing::debug!(
            candidates = response.candidates.len(),
            block_reason = response.block_reason(),
            total_tokens = response.usage_metadata.map(|u| u.total_token_count),
            "gemini response"
        );
    }

    fn log_stream_chunk(&self, chunk: &GenerateContentResponse) {
        tracing::trace!(text = %chunk.text(), "gemini stream chunk");
    }

    fn log_operation(&self, operation: &VideoOperation) {
        tracing::debug!(
            name = %operation.name,
            done = operation.done,
            failed = operation.error.is_some(),
            "video operation"
        );
    }
}
