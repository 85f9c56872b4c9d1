use serde::{Deserialize, Serialize};

use crate::types::Message;

/// Title given to sessions that have not been named yet.
pub const DEFAULT_TITLE: &str = "Nueva conversación";

/// Maximum number of characters kept when a title is derived from text.
const TITLE_CHARS: usize = 30;

/// One saved conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    /// Time-derived identifier, unique within the store.
    pub id: String,

    /// Display title shown in the session list.
    pub title: String,

    /// Messages in conversation order.
    pub messages: Vec<Message>,

    /// Time of the last change in Unix milliseconds.
    pub last_modified: i64,
}

impl ChatSession {
    /// Creates an empty session.
    pub fn new(id: impl Into<String>, title: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            messages: Vec::new(),
            last_modified: now,
        }
    }

    /// Returns the message with the given id.
    pub fn message(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    /// Returns the message with the given id for mutation.
    pub fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Returns true while the session still has the placeholder title.
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }
}

/// Derives a session title from the first thing the user typed.
///
/// Keeps the first 30 characters and marks truncation with `...`.
pub fn title_from_text(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > TITLE_CHARS {
        let head: String = text.chars().take(TITLE_CHARS).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn short_titles_are_kept() {
        assert_eq!(title_from_text("hola"), "hola");
    }

    #[test]
    fn long_titles_are_truncated_on_char_boundaries() {
        let text = "Explica la teoría de cuerdas simplemente por favor";
        let title = title_from_text(text);
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), 33);
        assert!(title.starts_with("Explica la teoría de cuerdas s"));
    }

    #[test]
    fn serializes_like_local_storage_blob() {
        let session = ChatSession::new("10", DEFAULT_TITLE, 10);
        assert_eq!(
            to_value(&session).unwrap(),
            json!({
                "id": "10",
                "title": "Nueva conversación",
                "messages": [],
                "lastModified": 10
            })
        );
        assert!(session.has_default_title());
    }
}
