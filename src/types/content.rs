use serde::{Deserialize, Serialize};

use crate::types::{Message, Role};

/// A single turn sent to or received from the Gemini API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    /// `user` or `model`; absent for system instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// The parts making up this turn.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Creates a single-text-part turn with the given role.
    pub fn text_turn(role: Role, text: impl Into<String>) -> Self {
        Self {
            role: Some(role.as_str().to_string()),
            parts: vec![Part::text(text)],
        }
    }

    /// Creates a user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self::text_turn(Role::User, text)
    }

    /// Creates a role-less turn for `systemInstruction`.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: None,
            parts: vec![Part::text(text)],
        }
    }

    /// Concatenates the visible text parts, skipping thought summaries.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| !p.thought.unwrap_or(false))
            .filter_map(|p| p.text.as_deref())
            .collect()
    }
}

impl From<&Message> for Content {
    fn from(message: &Message) -> Self {
        Self::text_turn(message.role, message.content.clone())
    }
}

/// One piece of a turn: text or inline binary data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Inline binary payload (generated images).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,

    /// Set on thought-summary parts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

impl Part {
    /// Creates a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }
}

/// Base64-encoded binary data embedded in a response part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type of the payload.
    pub mime_type: String,

    /// Base64 payload.
    pub data: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn user_turn_serialization() {
        assert_eq!(
            to_value(Content::user("hola")).unwrap(),
            json!({"role": "user", "parts": [{"text": "hola"}]})
        );
    }

    #[test]
    fn system_turn_has_no_role() {
        assert_eq!(
            to_value(Content::system("be brief")).unwrap(),
            json!({"parts": [{"text": "be brief"}]})
        );
    }

    #[test]
    fn text_skips_thoughts_and_images() {
        let content: Content = serde_json::from_value(json!({
            "role": "model",
            "parts": [
                {"text": "pensando", "thought": true},
                {"text": "Hola"},
                {"inlineData": {"mimeType": "image/png", "data": "AAAA"}},
                {"text": " mundo"}
            ]
        }))
        .unwrap();
        assert_eq!(content.text(), "Hola mundo");
        assert_eq!(
            content.parts[2].inline_data.as_ref().map(|d| d.mime_type.as_str()),
            Some("image/png")
        );
    }
}
