//! The conversation controller.
//!
//! [`Conversation`] ties the session store, a [`Backend`], and a
//! [`Renderer`] together: it classifies each request, records the user's
//! message, runs the matching remote call, and stores the reply. At most one
//! request is in flight at a time; the [`SendGate`] enforces that.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use futures::StreamExt;

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::error_panel::{DEFAULT_REPORT_URL, ErrorPanel};
use crate::intent::{Force, Intent};
use crate::progress;
use crate::render::Renderer;
use crate::store::SessionStore;
use crate::types::{ChatSession, Message, Role};
use crate::utils::time::now_millis;

const IDLE: u8 = 0;

/// How often a stalled stream re-checks for a user interrupt.
const INTERRUPT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// What the send gate is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendState {
    Idle,
    Sending(Intent),
}

/// Admits one request at a time.
///
/// Entering the sending state is a compare-and-swap from idle; the state
/// returns to idle only when the [`InFlight`] guard is dropped, whether the
/// request finished, failed, or was abandoned mid-await.
#[derive(Debug, Clone, Default)]
pub struct SendGate {
    state: Arc<AtomicU8>,
}

impl SendGate {
    /// Creates an idle gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters the sending state, or returns `None` if a request is in flight.
    pub fn try_begin(&self, intent: Intent) -> Option<InFlight> {
        self.state
            .compare_exchange(IDLE, encode(intent), Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlight {
                state: Arc::clone(&self.state),
            })
    }

    /// The current state.
    pub fn state(&self) -> SendState {
        decode(self.state.load(Ordering::Acquire))
    }

    /// Returns true while a request is in flight.
    pub fn is_sending(&self) -> bool {
        self.state() != SendState::Idle
    }
}

/// Proof that a request holds the gate; dropping it releases the gate.
#[derive(Debug)]
pub struct InFlight {
    state: Arc<AtomicU8>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.state.store(IDLE, Ordering::Release);
    }
}

fn encode(intent: Intent) -> u8 {
    match intent {
        Intent::Chat => 1,
        Intent::Image => 2,
        Intent::Video => 3,
    }
}

fn decode(value: u8) -> SendState {
    match value {
        1 => SendState::Sending(Intent::Chat),
        2 => SendState::Sending(Intent::Image),
        3 => SendState::Sending(Intent::Video),
        _ => SendState::Idle,
    }
}

/// How a send ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing happened: the input was empty or another request is in flight.
    Ignored,
    /// The reply was stored.
    Completed,
    /// The user stopped a streaming reply; the partial text was kept.
    Interrupted,
    /// A video request is waiting for the user to select an API key.
    KeySelectionRequired,
    /// The request failed.
    Failed(ErrorPanel),
}

/// A video request held back until an API key is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// The user's text.
    pub text: String,
    pub intent: Intent,
    /// Session already holding the user's message, if it was saved.
    pub session_id: Option<String>,
}

/// The last failure, kept for retry.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FailedRequest {
    text: String,
    intent: Intent,
    session_id: String,
    panel: ErrorPanel,
    /// Model reply that streamed partway before the failure.
    partial_reply: Option<String>,
}

/// Drives one user's conversations.
pub struct Conversation<B: Backend> {
    backend: B,
    store: SessionStore,
    gate: SendGate,
    pending: Option<PendingRequest>,
    last_error: Option<FailedRequest>,
    partial_reply: Option<String>,
    report_url: String,
}

impl<B: Backend> Conversation<B> {
    /// Creates a controller over a loaded store.
    pub fn new(backend: B, store: SessionStore) -> Self {
        Self {
            backend,
            store,
            gate: SendGate::new(),
            pending: None,
            last_error: None,
            partial_reply: None,
            report_url: DEFAULT_REPORT_URL.to_string(),
        }
    }

    /// Sets the target of the "report issue" action.
    pub fn with_report_url(mut self, report_url: impl Into<String>) -> Self {
        self.report_url = report_url.into();
        self
    }

    /// Sends user input.
    ///
    /// The input is trimmed; empty input, or input arriving while another
    /// request is in flight, is ignored. Otherwise the request is classified,
    /// the user's message is stored (in a new session titled from the text if
    /// none is active), and the reply is generated and stored.
    pub async fn send(
        &mut self,
        input: &str,
        force: Force,
        renderer: &mut dyn Renderer,
    ) -> SendOutcome {
        let text = input.trim();
        if text.is_empty() {
            return SendOutcome::Ignored;
        }
        let intent = Intent::classify(text, force);
        self.submit(text.to_string(), intent, None, renderer).await
    }

    /// Installs an API key. Returns false for a blank key.
    pub fn select_api_key(&mut self, api_key: &str) -> bool {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return false;
        }
        self.backend.set_api_key(api_key);
        true
    }

    /// Re-submits the request that was waiting for an API key.
    pub async fn resume_pending(&mut self, renderer: &mut dyn Renderer) -> SendOutcome {
        if self.gate.is_sending() {
            return SendOutcome::Ignored;
        }
        let Some(pending) = self.pending.take() else {
            return SendOutcome::Ignored;
        };
        self.submit(pending.text, pending.intent, pending.session_id, renderer)
            .await
    }

    /// Drops the request that was waiting for an API key.
    pub fn cancel_pending(&mut self) -> Option<PendingRequest> {
        self.pending.take()
    }

    /// Re-runs the last failed request against its already stored message.
    ///
    /// A partial reply left by a failed stream is removed first so the
    /// retried reply replaces it.
    pub async fn retry(&mut self, renderer: &mut dyn Renderer) -> SendOutcome {
        if self.gate.is_sending() {
            return SendOutcome::Ignored;
        }
        let Some(failed) = self.last_error.take() else {
            return SendOutcome::Ignored;
        };
        if let Some(reply_id) = &failed.partial_reply {
            self.drop_message(&failed.session_id, reply_id);
        }
        self.submit(failed.text, failed.intent, Some(failed.session_id), renderer)
            .await
    }

    /// Clears the error panel.
    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }

    /// The error panel currently shown, if any.
    pub fn last_error(&self) -> Option<&ErrorPanel> {
        self.last_error.as_ref().map(|failed| &failed.panel)
    }

    /// The request waiting for an API key, if any.
    pub fn pending(&self) -> Option<&PendingRequest> {
        self.pending.as_ref()
    }

    /// Where issues are reported.
    pub fn report_url(&self) -> &str {
        &self.report_url
    }

    /// Starts an empty session and makes it active.
    pub fn new_session(&mut self) -> String {
        self.last_error = None;
        self.store.create_session(None)
    }

    /// Makes a session active. Returns false if it does not exist.
    pub fn select_session(&mut self, id: &str) -> bool {
        let selected = self.store.select_session(id);
        if selected {
            self.last_error = None;
        }
        selected
    }

    /// Deletes a session. Returns false if it does not exist.
    pub fn delete_session(&mut self, id: &str) -> bool {
        self.store.delete_session(id)
    }

    /// All sessions, most recently created first.
    pub fn sessions(&self) -> &[ChatSession] {
        self.store.sessions()
    }

    /// The active session.
    pub fn active_session(&self) -> Option<&ChatSession> {
        self.store.active()
    }

    /// The state of the send gate.
    pub fn state(&self) -> SendState {
        self.gate.state()
    }

    /// The gate admitting requests.
    pub fn gate(&self) -> &SendGate {
        &self.gate
    }

    /// The session store.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Gives the store back.
    pub fn into_store(self) -> SessionStore {
        self.store
    }

    async fn submit(
        &mut self,
        text: String,
        intent: Intent,
        saved_in: Option<String>,
        renderer: &mut dyn Renderer,
    ) -> SendOutcome {
        let Some(_in_flight) = self.gate.try_begin(intent) else {
            tracing::debug!("request already in flight; ignoring input");
            return SendOutcome::Ignored;
        };

        if intent == Intent::Video && !self.backend.has_api_key() {
            self.pending = Some(PendingRequest {
                text,
                intent,
                session_id: saved_in,
            });
            renderer.print_key_selection();
            return SendOutcome::KeySelectionRequired;
        }
        self.pending = None;
        self.last_error = None;

        let saved_in = saved_in.filter(|id| self.store.get(id).is_some());
        let (session_id, history) = match saved_in {
            Some(id) => {
                let history = history_before(self.store.get(&id), &text);
                (id, history)
            }
            None => {
                let id = match self.store.active_id() {
                    Some(id) => id.to_string(),
                    None => self.store.create_session(Some(&text)),
                };
                let history = self
                    .store
                    .get(&id)
                    .map(|s| s.messages.clone())
                    .unwrap_or_default();
                let user = Message::user(self.store.next_id(), text.as_str(), now_millis());
                if let Err(err) = self.store.push_message(&id, user) {
                    return self.fail(text, intent, id, err, renderer);
                }
                (id, history)
            }
        };

        tracing::debug!(%intent, session = %session_id, "dispatching request");
        let result = match intent {
            Intent::Chat => self.run_chat(&session_id, &history, &text, renderer).await,
            Intent::Image => self.run_image(&session_id, &text, renderer).await,
            Intent::Video => self.run_video(&session_id, &text, renderer).await,
        };

        match result {
            Ok(outcome) => outcome,
            Err(err) if intent == Intent::Video && err.is_selection_required() => {
                tracing::info!("video request needs an API key selection");
                self.pending = Some(PendingRequest {
                    text,
                    intent,
                    session_id: Some(session_id),
                });
                renderer.print_key_selection();
                SendOutcome::KeySelectionRequired
            }
            Err(err) => self.fail(text, intent, session_id, err, renderer),
        }
    }

    fn fail(
        &mut self,
        text: String,
        intent: Intent,
        session_id: String,
        err: Error,
        renderer: &mut dyn Renderer,
    ) -> SendOutcome {
        tracing::warn!(error = %err, %intent, "request failed");
        let panel = ErrorPanel::new(&err, self.report_url.as_str());
        renderer.print_error_panel(&panel);
        self.last_error = Some(FailedRequest {
            text,
            intent,
            session_id,
            panel: panel.clone(),
            partial_reply: self.partial_reply.take(),
        });
        SendOutcome::Failed(panel)
    }

    async fn run_chat(
        &mut self,
        session_id: &str,
        history: &[Message],
        text: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<SendOutcome> {
        self.partial_reply = None;
        let reply_id = self.store.next_id();
        self.store.push_message(
            session_id,
            Message::model(reply_id.as_str(), "", now_millis()),
        )?;
        renderer.start_message(Role::Model);

        let mut content = String::new();
        let streamed = self
            .stream_into(session_id, &reply_id, &mut content, history, text, renderer)
            .await;
        if streamed.is_err() {
            if content.is_empty() {
                self.drop_message(session_id, &reply_id);
            } else {
                self.partial_reply = Some(reply_id);
            }
        }
        let outcome = streamed?;
        match outcome {
            SendOutcome::Interrupted => renderer.print_interrupted(),
            _ => renderer.finish_response(),
        }
        Ok(outcome)
    }

    async fn stream_into(
        &mut self,
        session_id: &str,
        reply_id: &str,
        content: &mut String,
        history: &[Message],
        text: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<SendOutcome> {
        let mut fragments = self.backend.stream_chat(history, text).await?;
        let mut interrupt_check = tokio::time::interval(INTERRUPT_CHECK_INTERVAL);
        loop {
            if renderer.should_interrupt() {
                return Ok(SendOutcome::Interrupted);
            }
            let next = tokio::select! {
                next = fragments.next() => next,
                _ = interrupt_check.tick() => continue,
            };
            let Some(fragment) = next else {
                return Ok(SendOutcome::Completed);
            };
            let fragment = fragment?;
            content.push_str(&fragment);
            self.store
                .update_message_content(session_id, reply_id, content)?;
            renderer.print_text(&fragment);
        }
    }

    fn drop_message(&mut self, session_id: &str, message_id: &str) {
        let Some(session) = self.store.get(session_id) else {
            return;
        };
        let messages = session
            .messages
            .iter()
            .filter(|m| m.id != message_id)
            .cloned()
            .collect();
        if let Err(err) = self.store.replace_messages(session_id, messages, None) {
            tracing::warn!(error = %err, "could not remove empty reply");
        }
    }

    async fn run_image(
        &mut self,
        session_id: &str,
        text: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<SendOutcome> {
        renderer.print_progress(progress::GENERATING_IMAGE);
        let image_url = self.backend.generate_image(text).await?;
        let reply = Message::model(
            self.store.next_id(),
            format!("He generado esta imagen basada en tu solicitud: \"{text}\""),
            now_millis(),
        )
        .with_image_url(image_url);
        self.store.push_message(session_id, reply.clone())?;
        crate::render::render_message(renderer, &reply);
        Ok(SendOutcome::Completed)
    }

    async fn run_video(
        &mut self,
        session_id: &str,
        text: &str,
        renderer: &mut dyn Renderer,
    ) -> Result<SendOutcome> {
        renderer.print_progress(progress::PREPARING);
        let video_url = {
            let mut on_progress = |status: &str| renderer.print_progress(status);
            self.backend.generate_video(text, &mut on_progress).await?
        };
        let reply = Message::model(
            self.store.next_id(),
            format!("Tu video cinematográfico está listo: \"{text}\""),
            now_millis(),
        )
        .with_video_url(video_url);
        self.store.push_message(session_id, reply.clone())?;
        crate::render::render_message(renderer, &reply);
        Ok(SendOutcome::Completed)
    }
}

/// Messages that precede the latest user message carrying `text`.
fn history_before(session: Option<&ChatSession>, text: &str) -> Vec<Message> {
    let Some(session) = session else {
        return Vec::new();
    };
    let end = session
        .messages
        .iter()
        .rposition(|m| m.role == Role::User && m.content == text)
        .unwrap_or(session.messages.len());
    session.messages[..end].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_admits_one_request() {
        let gate = SendGate::new();
        assert_eq!(gate.state(), SendState::Idle);
        let first = gate.try_begin(Intent::Chat).unwrap();
        assert_eq!(gate.state(), SendState::Sending(Intent::Chat));
        assert!(gate.try_begin(Intent::Video).is_none());
        drop(first);
        assert_eq!(gate.state(), SendState::Idle);
        let second = gate.try_begin(Intent::Video).unwrap();
        assert_eq!(gate.state(), SendState::Sending(Intent::Video));
        drop(second);
        assert!(!gate.is_sending());
    }

    #[test]
    fn gate_clones_share_state() {
        let gate = SendGate::new();
        let other = gate.clone();
        let _guard = gate.try_begin(Intent::Image).unwrap();
        assert_eq!(other.state(), SendState::Sending(Intent::Image));
        assert!(other.try_begin(Intent::Chat).is_none());
    }

    #[test]
    fn history_stops_before_matching_user_message() {
        let mut session = ChatSession::new("s", "t", 0);
        session.messages = vec![
            Message::user("1", "hola", 1),
            Message::model("2", "¡Hola!", 2),
            Message::user("3", "otra", 3),
            Message::model("4", "", 4),
        ];
        let history = history_before(Some(&session), "otra");
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].id, "2");
        assert_eq!(history_before(Some(&session), "nada").len(), 4);
        assert!(history_before(None, "hola").is_empty());
    }
}
