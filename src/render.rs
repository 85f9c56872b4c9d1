//! Terminal rendering of messages, progress, and failures.
//!
//! This module provides the [`Renderer`] trait, a plain-text implementation
//! with optional ANSI styling, and helpers that lay out stored messages and
//! whole sessions through any renderer.

use std::io::{self, Stdout, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error_panel::{ErrorCategory, ErrorPanel};
use crate::types::{ChatSession, DataUrl, Message, Role};

/// ANSI escape code for bold text (used for message headers).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code for dim text (used for progress and code fences).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for progress).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the model header).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for code and credential panels).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for the user header).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for blue text (used for connectivity panels).
const ANSI_BLUE: &str = "\x1b[34m";

/// ANSI escape code for magenta text (used for attachments).
const ANSI_MAGENTA: &str = "\x1b[35m";

/// Prompts offered on an empty conversation.
pub const SUGGESTIONS: [&str; 4] = [
    "Genera un video de un astronauta en Marte",
    "Crea una imagen de un samurái futurista",
    "Explica la teoría de cuerdas simplemente",
    "Escribe código para un juego en JS",
];

/// Where to learn about keys with video access.
pub const BILLING_DOCS_URL: &str = "https://ai.google.dev/gemini-api/docs/billing";

/// Media attached to a message, as displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// An inline image.
    Image {
        /// MIME type of the image.
        mime_type: String,
        /// Decoded size in bytes.
        size: usize,
    },
    /// A downloaded video.
    Video {
        /// Where the video can be played from.
        url: String,
    },
}

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
/// - Recording renderers in tests
pub trait Renderer: Send {
    /// Called before the content of a message is printed.
    fn start_message(&mut self, role: Role);

    /// Print a chunk of regular text.
    ///
    /// This is called incrementally as fragments are streamed from the API.
    fn print_text(&mut self, text: &str);

    /// Print a fenced code block.
    fn print_code_block(&mut self, language: Option<&str>, code: &str);

    /// Print a message attachment.
    fn print_attachment(&mut self, attachment: &Attachment);

    /// Print a status update for a long-running generation.
    fn print_progress(&mut self, status: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print an error message.
    fn print_error(&mut self, error: &str);

    /// Print a categorized failure with its available actions.
    fn print_error_panel(&mut self, panel: &ErrorPanel);

    /// Ask the user to choose an API key for video generation.
    fn print_key_selection(&mut self);

    /// Called when a message is complete.
    ///
    /// Used to ensure proper newlines and cleanup after streaming.
    fn finish_response(&mut self);

    /// Called when the stream is interrupted by the user.
    fn print_interrupted(&mut self) {}

    /// Returns true if streaming should be interrupted.
    fn should_interrupt(&self) -> bool {
        false
    }
}

/// A piece of message content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Prose, printed as-is.
    Text(&'a str),
    /// A fenced code block.
    Code {
        /// Language named after the opening fence.
        language: Option<&'a str>,
        /// The code between the fences, without the final newline.
        code: &'a str,
    },
}

/// Splits message content into prose and fenced code blocks.
///
/// A fence is a line starting with three backticks, optionally followed by a
/// language name. An unterminated block runs to the end of the content.
pub fn split_code_blocks(content: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut offset = 0;
    let mut open: Option<(Option<&str>, usize)> = None;

    for line in content.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim();
        match open {
            None => {
                if let Some(rest) = trimmed.strip_prefix("```") {
                    if line_start > text_start {
                        segments.push(Segment::Text(&content[text_start..line_start]));
                    }
                    let language = rest.trim();
                    open = Some(((!language.is_empty()).then_some(language), offset));
                }
            }
            Some((language, code_start)) => {
                if trimmed == "```" {
                    segments.push(Segment::Code {
                        language,
                        code: strip_final_newline(&content[code_start..line_start]),
                    });
                    open = None;
                    text_start = offset;
                }
            }
        }
    }

    match open {
        Some((language, code_start)) => segments.push(Segment::Code {
            language,
            code: strip_final_newline(&content[code_start..]),
        }),
        None if text_start < content.len() => {
            segments.push(Segment::Text(&content[text_start..]));
        }
        None => {}
    }
    segments
}

fn strip_final_newline(s: &str) -> &str {
    s.strip_suffix('\n').unwrap_or(s)
}

/// Describes a message's media for display.
pub fn attachments(message: &Message) -> Vec<Attachment> {
    let mut out = Vec::new();
    if let Some(url) = &message.image_url {
        let (mime_type, size) = match DataUrl::parse(url) {
            Some(data) => {
                let size = data.decoded_len();
                (data.mime_type, size)
            }
            None => ("image".to_string(), 0),
        };
        out.push(Attachment::Image { mime_type, size });
    }
    if let Some(url) = &message.video_url {
        out.push(Attachment::Video { url: url.clone() });
    }
    out
}

/// Renders one stored message.
pub fn render_message(renderer: &mut dyn Renderer, message: &Message) {
    renderer.start_message(message.role);
    for segment in split_code_blocks(&message.content) {
        match segment {
            Segment::Text(text) => renderer.print_text(text),
            Segment::Code { language, code } => renderer.print_code_block(language, code),
        }
    }
    for attachment in attachments(message) {
        renderer.print_attachment(&attachment);
    }
    renderer.finish_response();
}

/// Renders a whole session, or the welcome card when it has no messages.
pub fn render_session(renderer: &mut dyn Renderer, session: Option<&ChatSession>) {
    match session {
        Some(session) if !session.messages.is_empty() => {
            renderer.print_info(&format!("── {} ──", session.title));
            for message in &session.messages {
                render_message(renderer, message);
            }
        }
        _ => render_welcome(renderer),
    }
}

/// Renders the welcome card with the suggested prompts.
pub fn render_welcome(renderer: &mut dyn Renderer) {
    renderer.print_info("Experiencia balaAI");
    renderer.print_info(
        "IA Multimodal de nueva generación. Chatea, crea imágenes y genera videos cinematográficos.",
    );
    for (index, suggestion) in SUGGESTIONS.iter().enumerate() {
        renderer.print_info(&format!("  {}. {suggestion}", index + 1));
    }
}

/// Plain text renderer with optional ANSI styling.
///
/// This renderer outputs text directly to stdout with optional ANSI escape
/// codes for headers, code blocks, progress, and error panels.
pub struct PlainTextRenderer {
    stdout: Stdout,
    use_color: bool,
    in_progress: bool,
    line_start: bool,
    interrupted: Option<Arc<AtomicBool>>,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self {
            stdout: io::stdout(),
            use_color,
            in_progress: false,
            line_start: true,
            interrupted: None,
        }
    }

    /// Attaches an interrupt flag to the renderer.
    pub fn with_interrupt(mut self, interrupted: Arc<AtomicBool>) -> Self {
        self.interrupted = Some(interrupted);
        self
    }

    /// Creates a new PlainTextRenderer with specified color and interrupt flag.
    pub fn with_color_and_interrupt(use_color: bool, interrupted: Arc<AtomicBool>) -> Self {
        Self::with_color(use_color).with_interrupt(interrupted)
    }

    /// Flushes stdout to ensure immediate display of streamed content.
    fn flush(&mut self) {
        let _ = self.stdout.flush();
    }

    fn write(&mut self, text: &str) {
        print!("{text}");
        if !text.is_empty() {
            self.line_start = text.ends_with('\n');
        }
        self.flush();
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    /// Ends the progress line, if one is being drawn.
    fn end_progress(&mut self) {
        if self.in_progress {
            self.in_progress = false;
            if self.use_color {
                self.write("\r\x1b[2K");
            } else if !self.line_start {
                self.write("\n");
            }
        }
    }

    fn ensure_line_start(&mut self) {
        if !self.line_start {
            self.write("\n");
        }
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for PlainTextRenderer {
    fn start_message(&mut self, role: Role) {
        self.end_progress();
        self.ensure_line_start();
        let header = match role {
            Role::User => self.styled(&format!("{ANSI_BOLD}{ANSI_GREEN}"), "Tú"),
            Role::Model => self.styled(&format!("{ANSI_BOLD}{ANSI_CYAN}"), "balaAI"),
        };
        self.write(&format!("{header}\n"));
    }

    fn print_text(&mut self, text: &str) {
        self.end_progress();
        self.write(text);
    }

    fn print_code_block(&mut self, language: Option<&str>, code: &str) {
        self.end_progress();
        self.ensure_line_start();
        let fence = self.styled(ANSI_DIM, &format!("┌─ {}", language.unwrap_or("code")));
        let body = self.styled(ANSI_YELLOW, code);
        let close = self.styled(ANSI_DIM, "└─");
        self.write(&format!("{fence}\n{body}\n{close}\n"));
    }

    fn print_attachment(&mut self, attachment: &Attachment) {
        self.end_progress();
        self.ensure_line_start();
        let line = match attachment {
            Attachment::Image { mime_type, size } => {
                format!("[imagen: {mime_type}, {size} bytes]")
            }
            Attachment::Video { url } => format!("[video: {url}]"),
        };
        let line = self.styled(ANSI_MAGENTA, &line);
        self.write(&format!("{line}\n"));
    }

    fn print_progress(&mut self, status: &str) {
        if self.use_color {
            // Redraw the same line for each update.
            let line = self.styled(&format!("{ANSI_DIM}{ANSI_ITALIC}"), status);
            if !self.in_progress {
                self.ensure_line_start();
            }
            print!("\r\x1b[2K{line}");
            self.line_start = false;
            self.flush();
        } else {
            self.ensure_line_start();
            self.write(&format!("{status}\n"));
        }
        self.in_progress = true;
    }

    fn print_info(&mut self, info: &str) {
        self.end_progress();
        self.ensure_line_start();
        println!("{info}");
        self.line_start = true;
        self.flush();
    }

    fn print_error(&mut self, error: &str) {
        self.end_progress();
        self.ensure_line_start();
        let line = self.styled(ANSI_RED, &format!("Error: {error}"));
        eprintln!("{line}");
    }

    fn print_error_panel(&mut self, panel: &ErrorPanel) {
        self.end_progress();
        self.ensure_line_start();
        let color = match panel.info.category {
            ErrorCategory::Credential => ANSI_YELLOW,
            ErrorCategory::Connectivity => ANSI_BLUE,
            ErrorCategory::Generic => ANSI_RED,
        };
        let title = self.styled(
            &format!("{ANSI_BOLD}{color}"),
            &format!("[{}] {}", panel.info.icon, panel.info.title),
        );
        let actions = self.styled(
            ANSI_DIM,
            "/retry to try again · /report to report the issue · /dismiss to close",
        );
        self.write(&format!("\n{title}\n{}\n{actions}\n", panel.info.description));
    }

    fn print_key_selection(&mut self) {
        self.end_progress();
        self.ensure_line_start();
        let title = self.styled(&format!("{ANSI_BOLD}{ANSI_YELLOW}"), "Llave de Pago Requerida");
        let docs = self.styled(ANSI_DIM, BILLING_DOCS_URL);
        self.write(&format!(
            "\n{title}\nLa generación de video con Veo 3.1 requiere que selecciones una API Key \
             vinculada a un proyecto de Google Cloud con facturación activa.\n{docs}\n"
        ));
    }

    fn finish_response(&mut self) {
        self.end_progress();
        self.ensure_line_start();
        self.write("\n");
    }

    fn print_interrupted(&mut self) {
        self.end_progress();
        let message = self.styled(ANSI_DIM, "[interrupted]");
        self.write(&format!("\n{message}\n"));
    }

    fn should_interrupt(&self) -> bool {
        self.interrupted
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}
