use serde::{Deserialize, Serialize};

use crate::types::Role;

/// One turn in a conversation.
///
/// The content of a model message is rewritten while its response streams in;
/// every other field is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Time-derived identifier, unique within the owning session.
    pub id: String,

    /// Who authored the message.
    pub role: Role,

    /// The text of the message.
    pub content: String,

    /// A `data:` URL holding a generated image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    /// A `file://` URL pointing at a downloaded video.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    /// Creation time in Unix milliseconds.
    pub timestamp: i64,
}

impl Message {
    /// Creates a new message.
    pub fn new(id: impl Into<String>, role: Role, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            image_url: None,
            video_url: None,
            timestamp,
        }
    }

    /// Creates a user message.
    pub fn user(id: impl Into<String>, content: impl Into<String>, timestamp: i64) -> Self {
        Self::new(id, Role::User, content, timestamp)
    }

    /// Creates a model message.
    pub fn model(id: impl Into<String>, content: impl Into<String>, timestamp: i64) -> Self {
        Self::new(id, Role::Model, content, timestamp)
    }

    /// Attaches a generated image.
    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self
    }

    /// Attaches a downloaded video.
    pub fn with_video_url(mut self, video_url: impl Into<String>) -> Self {
        self.video_url = Some(video_url.into());
        self
    }

    /// Returns true if the message carries an image or a video.
    pub fn has_media(&self) -> bool {
        self.image_url.is_some() || self.video_url.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn serializes_camel_case_without_absent_media() {
        let message = Message::user("1700000000000", "hola", 1_700_000_000_000);
        assert_eq!(
            to_value(&message).unwrap(),
            json!({
                "id": "1700000000000",
                "role": "user",
                "content": "hola",
                "timestamp": 1_700_000_000_000i64
            })
        );
    }

    #[test]
    fn reads_media_fields() {
        let message: Message = serde_json::from_value(json!({
            "id": "2",
            "role": "model",
            "content": "listo",
            "videoUrl": "file:///tmp/2.mp4",
            "timestamp": 5
        }))
        .unwrap();
        assert_eq!(message.role, Role::Model);
        assert_eq!(message.video_url.as_deref(), Some("file:///tmp/2.mp4"));
        assert!(message.image_url.is_none());
        assert!(message.has_media());
    }
}
