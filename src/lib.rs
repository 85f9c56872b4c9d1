// Public modules
pub mod backend;
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod conversation;
pub mod error;
pub mod error_panel;
pub mod ids;
pub mod intent;
pub mod progress;
pub mod render;
pub mod sse;
pub mod store;
pub mod types;
pub mod utils;

mod observability;

// Re-exports
pub use backend::Backend;
pub use client::{ChunkStream, Gemini, GeminiOptions, TextStream};
pub use client_logger::{ClientLogger, TracingLogger};
pub use conversation::{Conversation, PendingRequest, SendGate, SendOutcome, SendState};
pub use error::{Error, Result};
pub use error_panel::{ErrorCategory, ErrorInfo, ErrorPanel, classify_error};
pub use intent::{Force, Intent};
pub use observability::register_biometrics;
pub use render::{Attachment, PlainTextRenderer, Renderer};
pub use store::{FileStore, KeyValueStore, MemoryStore, SessionStore};
pub use types::*;
