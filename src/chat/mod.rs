//! The interactive REPL's configuration and slash commands.
//!
//! - [`config`]: CLI flags, the YAML file, and the resolved [`ChatConfig`]
//! - [`commands`]: slash command parsing

mod commands;
mod config;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use commands::{ChatCommand, SessionRef, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, ConfigFile};
