//! Slash command parsing for the chat application.
//!
//! Lines starting with `/` drive the session sidebar, the tool menu, the
//! credential prompt, and the error panel. They are never sent to the model.

/// A session named on the command line, by list position or by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionRef {
    /// One-based position in the `/sessions` listing.
    Index(usize),
    /// A session identifier.
    Id(String),
}

impl SessionRef {
    /// Resolves to a session id, given ids in listing order.
    pub fn resolve<'a, I>(&self, ids: I) -> Option<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        match self {
            SessionRef::Index(n) => ids
                .into_iter()
                .nth(n.checked_sub(1)?)
                .map(str::to_string),
            SessionRef::Id(id) => ids
                .into_iter()
                .find(|candidate| *candidate == id.as_str())
                .map(str::to_string),
        }
    }
}

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Start an empty session.
    New,

    /// List saved sessions.
    Sessions,

    /// Make a session active.
    Select(SessionRef),

    /// Delete a session.
    Delete(SessionRef),

    /// Generate an image from the prompt regardless of its wording.
    Image(String),

    /// Generate a video from the prompt regardless of its wording.
    Video(String),

    /// Select an API key; `None` prompts for one.
    Key(Option<String>),

    /// Drop the request waiting for an API key.
    Cancel,

    /// Re-run the last failed request.
    Retry,

    /// Show where to report the last failure.
    Report,

    /// Clear the error panel.
    Dismiss,

    /// Re-render the active session.
    Show,

    /// Show the current configuration.
    ShowConfig,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command, or `None` if it
/// should be sent as a message.
///
/// # Examples
///
/// ```
/// # use novachat::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert!(parse_command("/video un atardecer").is_some());
/// assert!(parse_command("hola").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let body = input.strip_prefix('/')?;

    let mut parts = body.splitn(2, char::is_whitespace);
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(str::trim).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::New,
        "sessions" | "ls" => ChatCommand::Sessions,
        "select" | "open" => match argument {
            Some(arg) => ChatCommand::Select(parse_session_ref(arg)),
            None => ChatCommand::Invalid("/select requires a session number or id".to_string()),
        },
        "delete" | "rm" => match argument {
            Some(arg) => ChatCommand::Delete(parse_session_ref(arg)),
            None => ChatCommand::Invalid("/delete requires a session number or id".to_string()),
        },
        "image" | "imagen" => match argument {
            Some(prompt) => ChatCommand::Image(prompt.to_string()),
            None => ChatCommand::Invalid("/image requires a prompt".to_string()),
        },
        "video" => match argument {
            Some(prompt) => ChatCommand::Video(prompt.to_string()),
            None => ChatCommand::Invalid("/video requires a prompt".to_string()),
        },
        "key" => ChatCommand::Key(argument.map(str::to_string)),
        "cancel" => ChatCommand::Cancel,
        "retry" => ChatCommand::Retry,
        "report" => ChatCommand::Report,
        "dismiss" => ChatCommand::Dismiss,
        "show" => ChatCommand::Show,
        "config" => ChatCommand::ShowConfig,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "" => ChatCommand::Invalid("Empty command; try /help".to_string()),
        _ => ChatCommand::Invalid(format!("Unknown command: /{command}")),
    };

    Some(result)
}

fn parse_session_ref(arg: &str) -> SessionRef {
    // Session ids are millisecond timestamps; list positions are small.
    match arg.parse::<usize>() {
        Ok(n) if arg.len() < 6 => SessionRef::Index(n),
        _ => SessionRef::Id(arg.to_string()),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new conversation
  /sessions              List saved conversations
  /select <n|id>         Switch to a conversation
  /delete <n|id>         Delete a conversation
  /image <prompt>        Generate an image
  /video <prompt>        Generate a video
  /key [api-key]         Select the API key (prompts when omitted)
  /cancel                Drop the request waiting for an API key
  /retry                 Retry the last failed request
  /report                Show where to report the last failure
  /dismiss               Dismiss the error panel
  /show                  Show the current conversation
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /QUIT  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/new"), Some(ChatCommand::New));
        assert_eq!(parse_command("/sessions"), Some(ChatCommand::Sessions));
        assert_eq!(
            parse_command("/select 2"),
            Some(ChatCommand::Select(SessionRef::Index(2)))
        );
        assert_eq!(
            parse_command("/delete 1718000000000"),
            Some(ChatCommand::Delete(SessionRef::Id("1718000000000".to_string())))
        );
        assert!(matches!(
            parse_command("/select"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("requires")
        ));
    }

    #[test]
    fn parse_tool_commands() {
        assert_eq!(
            parse_command("/image   un gato con sombrero "),
            Some(ChatCommand::Image("un gato con sombrero".to_string()))
        );
        assert_eq!(
            parse_command("/video olas al atardecer"),
            Some(ChatCommand::Video("olas al atardecer".to_string()))
        );
        assert!(matches!(
            parse_command("/video"),
            Some(ChatCommand::Invalid(_))
        ));
    }

    #[test]
    fn parse_key_and_panel_commands() {
        assert_eq!(parse_command("/key"), Some(ChatCommand::Key(None)));
        assert_eq!(
            parse_command("/key abc123"),
            Some(ChatCommand::Key(Some("abc123".to_string())))
        );
        assert_eq!(parse_command("/cancel"), Some(ChatCommand::Cancel));
        assert_eq!(parse_command("/retry"), Some(ChatCommand::Retry));
        assert_eq!(parse_command("/report"), Some(ChatCommand::Report));
        assert_eq!(parse_command("/dismiss"), Some(ChatCommand::Dismiss));
        assert_eq!(parse_command("/show"), Some(ChatCommand::Show));
        assert_eq!(parse_command("/config"), Some(ChatCommand::ShowConfig));
    }

    #[test]
    fn unknown_commands() {
        assert_eq!(
            parse_command("/clear"),
            Some(ChatCommand::Invalid("Unknown command: /clear".to_string()))
        );
        assert!(matches!(parse_command("/"), Some(ChatCommand::Invalid(_))));
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hola, ¿qué tal?"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn session_refs_resolve() {
        let ids = ["30", "20", "10"];
        assert_eq!(
            SessionRef::Index(2).resolve(ids.iter().copied()),
            Some("20".to_string())
        );
        assert_eq!(SessionRef::Index(0).resolve(ids.iter().copied()), None);
        assert_eq!(SessionRef::Index(4).resolve(ids.iter().copied()), None);
        assert_eq!(
            SessionRef::Id("10".to_string()).resolve(ids.iter().copied()),
            Some("10".to_string())
        );
        assert_eq!(
            SessionRef::Id("99".to_string()).resolve(ids.iter().copied()),
            None
        );
    }

    #[test]
    fn help_text_lists_commands() {
        let help = help_text();
        for command in ["/new", "/image", "/video", "/key", "/retry", "/quit"] {
            assert!(help.contains(command), "missing {command}");
        }
    }
}
