//! The seam between the conversation controller and the remote service.

use async_trait::async_trait;

use crate::client::{Gemini, TextStream};
use crate::error::Result;
use crate::progress::ProgressFn;
use crate::types::Message;

/// Remote operations the conversation controller depends on.
///
/// [`Gemini`] is the production implementation; tests script their own.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Returns true if a credential is available for paid operations.
    fn has_api_key(&self) -> bool;

    /// Installs the credential chosen by the user.
    fn set_api_key(&mut self, api_key: &str);

    /// Streams a chat reply to `text`, given the session's prior messages.
    async fn stream_chat(&self, history: &[Message], text: &str) -> Result<TextStream>;

    /// Generates an image and returns it as a `data:` URL.
    async fn generate_image(&self, prompt: &str) -> Result<String>;

    /// Generates a video and returns a URL it can be played from.
    ///
    /// Progress strings are handed to `on_progress` as the job advances.
    async fn generate_video(
        &self,
        prompt: &str,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<String>;
}

#[async_trait]
impl Backend for Gemini {
    fn has_api_key(&self) -> bool {
        Gemini::has_api_key(self)
    }

    fn set_api_key(&mut self, api_key: &str) {
        Gemini::set_api_key(self, api_key);
    }

    async fn stream_chat(&self, history: &[Message], text: &str) -> Result<TextStream> {
        Gemini::stream_chat(self, history, text).await
    }

    async fn generate_image(&self, prompt: &str) -> Result<String> {
        Gemini::generate_image(self, prompt).await
    }

    async fn generate_video(
        &self,
        prompt: &str,
        on_progress: &mut ProgressFn<'_>,
    ) -> Result<String> {
        Gemini::generate_video(self, prompt, on_progress).await
    }
}
