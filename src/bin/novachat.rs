//! Interactive chat application for the Gemini API.
//!
//! This binary provides a streaming REPL for chatting with Gemini models and
//! generating images and videos, with conversations saved between runs.
//!
//! # Usage
//!
//! ```bash
//! # Basic usage with default settings
//! novachat
//!
//! # Specify a chat model
//! novachat --model gemini-2.5-pro
//!
//! # Keep everything in memory
//! novachat --no-persist
//!
//! # Read settings from a file
//! novachat --config ~/.config/novachat.yaml
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/new`, `/sessions`, `/select`, `/delete` - Manage conversations
//! - `/image <prompt>`, `/video <prompt>` - Force image or video generation
//! - `/key [api-key]` - Select the API key
//! - `/retry`, `/report`, `/dismiss` - Act on the last failure
//! - `/quit` - Exit the application

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use biometrics::Collector;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

use novachat::chat::{
    ChatArgs, ChatCommand, ChatConfig, PlainTextRenderer, Renderer, SessionRef, help_text,
    parse_command,
};
use novachat::render::render_session;
use novachat::utils::time::format_millis;
use novachat::{
    Conversation, FileStore, Force, Gemini, KeyValueStore, MemoryStore, SendOutcome, SessionStore,
    TracingLogger, register_biometrics,
};

/// Main entry point for the novachat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    register_biometrics(Collector::new());

    let (args, _) = ChatArgs::from_command_line_relaxed("novachat [OPTIONS]");
    let config = ChatConfig::from_args(args)?;

    let storage: Box<dyn KeyValueStore> = if config.persist {
        Box::new(FileStore::new(config.store_dir()))
    } else {
        Box::new(MemoryStore::new())
    };
    let store = SessionStore::load(storage);

    let client = Gemini::with_options(None, config.base_url.clone(), None)?
        .with_generation_options(config.to_gemini_options())
        .with_logger(Arc::new(TracingLogger));
    let mut conversation =
        Conversation::new(client, store).with_report_url(config.report_url.clone());

    // Flag for interrupt handling during streaming
    let interrupted = Arc::new(AtomicBool::new(false));
    let mut renderer =
        PlainTextRenderer::with_color_and_interrupt(config.use_color, interrupted.clone());
    let mut rl = DefaultEditor::new()?;

    // Set up Ctrl+C handler
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!("novachat (model: {})", config.chat_model);
    println!("Type /help for commands, /quit to exit\n");
    render_session(&mut renderer, conversation.active_session());

    loop {
        // Reset interrupt flag before each input
        interrupted.store(false, Ordering::Relaxed);

        let readline = rl.readline("Tú: ");

        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("¡Hasta luego!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::New => {
                            conversation.new_session();
                            render_session(&mut renderer, conversation.active_session());
                        }
                        ChatCommand::Sessions => {
                            print_sessions(&conversation);
                        }
                        ChatCommand::Select(session) => {
                            match resolve_session(&conversation, &session) {
                                Some(id) => {
                                    conversation.select_session(&id);
                                    render_session(&mut renderer, conversation.active_session());
                                }
                                None => renderer.print_error("No such conversation."),
                            }
                        }
                        ChatCommand::Delete(session) => {
                            match resolve_session(&conversation, &session) {
                                Some(id) => {
                                    conversation.delete_session(&id);
                                    renderer.print_info("Conversation deleted.");
                                }
                                None => renderer.print_error("No such conversation."),
                            }
                        }
                        ChatCommand::Image(prompt) => {
                            let outcome = conversation
                                .send(&prompt, Force::Image, &mut renderer)
                                .await;
                            drive(outcome, &mut conversation, &mut renderer, &mut rl).await;
                        }
                        ChatCommand::Video(prompt) => {
                            let outcome = conversation
                                .send(&prompt, Force::Video, &mut renderer)
                                .await;
                            drive(outcome, &mut conversation, &mut renderer, &mut rl).await;
                        }
                        ChatCommand::Key(key) => {
                            let key = match key {
                                Some(key) => Some(key),
                                None => {
                                    renderer.print_key_selection();
                                    read_key(&mut rl)
                                }
                            };
                            match key {
                                Some(key) if conversation.select_api_key(&key) => {
                                    renderer.print_info("API key selected.");
                                    if conversation.pending().is_some() {
                                        let outcome =
                                            conversation.resume_pending(&mut renderer).await;
                                        drive(outcome, &mut conversation, &mut renderer, &mut rl)
                                            .await;
                                    }
                                }
                                _ => renderer.print_info("No API key selected."),
                            }
                        }
                        ChatCommand::Cancel => match conversation.cancel_pending() {
                            Some(_) => renderer.print_info("Pending request cancelled."),
                            None => renderer.print_info("Nothing is pending."),
                        },
                        ChatCommand::Retry => {
                            if conversation.last_error().is_none() {
                                renderer.print_info("Nothing to retry.");
                                continue;
                            }
                            let outcome = conversation.retry(&mut renderer).await;
                            drive(outcome, &mut conversation, &mut renderer, &mut rl).await;
                        }
                        ChatCommand::Report => match conversation.last_error() {
                            Some(panel) => renderer.print_info(&format!(
                                "Report this issue at {}\n{}",
                                panel.report_url, panel.message
                            )),
                            None => renderer.print_info("Nothing to report."),
                        },
                        ChatCommand::Dismiss => {
                            conversation.dismiss_error();
                        }
                        ChatCommand::Show => {
                            render_session(&mut renderer, conversation.active_session());
                        }
                        ChatCommand::ShowConfig => {
                            print_config(&config, &conversation);
                        }
                        ChatCommand::Invalid(message) => {
                            renderer.print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to API
                let outcome = conversation.send(line, Force::None, &mut renderer).await;
                drive(outcome, &mut conversation, &mut renderer, &mut rl).await;
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\n¡Hasta luego!");
                break;
            }
            Err(err) => {
                renderer.print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

/// Follows a send through the credential prompt until it settles.
async fn drive(
    mut outcome: SendOutcome,
    conversation: &mut Conversation<Gemini>,
    renderer: &mut PlainTextRenderer,
    rl: &mut DefaultEditor,
) {
    while outcome == SendOutcome::KeySelectionRequired {
        let Some(key) = read_key(rl) else {
            conversation.cancel_pending();
            renderer.print_info("Video request cancelled.");
            return;
        };
        if !conversation.select_api_key(&key) {
            continue;
        }
        outcome = conversation.resume_pending(renderer).await;
    }
    if outcome == SendOutcome::Ignored {
        tracing::debug!("send ignored");
    }
}

/// Reads an API key; an empty line or Ctrl+C cancels.
fn read_key(rl: &mut DefaultEditor) -> Option<String> {
    match rl.readline("API key (empty to cancel): ") {
        Ok(line) => {
            let line = line.trim();
            (!line.is_empty()).then(|| line.to_string())
        }
        Err(_) => None,
    }
}

fn resolve_session(conversation: &Conversation<Gemini>, session: &SessionRef) -> Option<String> {
    session.resolve(conversation.sessions().iter().map(|s| s.id.as_str()))
}

fn print_sessions(conversation: &Conversation<Gemini>) {
    let sessions = conversation.sessions();
    if sessions.is_empty() {
        println!("    No saved conversations.");
        return;
    }
    let active = conversation.active_session().map(|s| s.id.as_str());
    println!("    Conversations:");
    for (index, session) in sessions.iter().enumerate() {
        let marker = if Some(session.id.as_str()) == active {
            "*"
        } else {
            " "
        };
        println!(
            "    {marker} {:>2}. {} ({} messages, {})",
            index + 1,
            session.title,
            session.messages.len(),
            format_millis(session.last_modified)
        );
    }
}

fn print_config(config: &ChatConfig, conversation: &Conversation<Gemini>) {
    let options = conversation.backend().options();
    println!("    Current Configuration:");
    println!("      Chat model: {}", options.chat_model);
    println!("      Image model: {}", options.image_model);
    println!("      Video model: {}", options.video_model);
    println!(
        "      Image aspect ratio: {}",
        options.image_aspect_ratio
    );
    println!(
        "      Video: {} {}",
        options.video_resolution, options.video_aspect_ratio
    );
    println!("      Poll interval: {}s", options.poll_interval.as_secs());
    println!("      API: {}", conversation.backend().base_url());
    println!(
        "      API key: {}",
        if conversation.backend().has_api_key() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    if config.persist {
        println!("      Data directory: {}", config.data_dir.display());
    } else {
        println!("      Data directory: (in memory)");
    }
    println!("      Media directory: {}", options.media_dir.display());
    match options.system_instruction.as_deref() {
        Some(_) => println!("      System instruction: (set)"),
        None => println!("      System instruction: (none)"),
    }
    println!("      Report URL: {}", conversation.report_url());
}
