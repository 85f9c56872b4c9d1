use serde::{Deserialize, Serialize};
use std::fmt;

/// The author of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the person at the keyboard.
    User,

    /// Produced by the remote model.
    Model,
}

impl Role {
    /// The role string the Gemini API expects in `Content.role`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn serializes_lowercase() {
        assert_eq!(to_value(Role::User).unwrap(), json!("user"));
        assert_eq!(to_value(Role::Model).unwrap(), json!("model"));
        let role: Role = serde_json::from_str("\"model\"").unwrap();
        assert_eq!(role, Role::Model);
    }
}
