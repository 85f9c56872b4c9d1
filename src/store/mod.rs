//! Persistent list of chat sessions.
//!
//! The store keeps every session in memory and mirrors the whole list, plus
//! the id of the active session, into a [`KeyValueStore`] after each change.
//! There is no incremental persistence and no schema version: a blob that
//! fails to parse is discarded on load, and a failed write is logged and
//! otherwise ignored so the in-memory list stays authoritative.

mod storage;

pub use storage::{FileStore, KeyValueStore, MemoryStore};

use crate::error::{Error, Result};
use crate::ids::IdClock;
use crate::observability::{STORE_LOAD_FAILURES, STORE_SAVE_FAILURES, STORE_SAVES};
use crate::types::{ChatSession, DEFAULT_TITLE, Message, Role, title_from_text};
use crate::utils::time::now_millis;

/// Key holding the JSON session list.
pub const SESSIONS_KEY: &str = "nova_ai_sessions";

/// Key holding the id of the last active session.
pub const LAST_ID_KEY: &str = "nova_ai_last_id";

/// In-memory session list mirrored to storage on every mutation.
pub struct SessionStore {
    storage: Box<dyn KeyValueStore>,
    sessions: Vec<ChatSession>,
    active: Option<String>,
    ids: IdClock,
}

impl SessionStore {
    /// Loads the session list from `storage`.
    ///
    /// Never fails: a missing, unreadable, or malformed blob yields an empty
    /// store and a warning in the log.
    pub fn load(storage: Box<dyn KeyValueStore>) -> Self {
        let sessions = match storage.get(SESSIONS_KEY) {
            Ok(Some(blob)) => match serde_json::from_str::<Vec<ChatSession>>(&blob) {
                Ok(sessions) => sessions,
                Err(err) => {
                    STORE_LOAD_FAILURES.click();
                    tracing::warn!(error = %err, "discarding malformed session list");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(err) => {
                STORE_LOAD_FAILURES.click();
                tracing::warn!(error = %err, "could not read session list");
                Vec::new()
            }
        };
        let last_id = storage.get(LAST_ID_KEY).ok().flatten();
        let active = match last_id {
            Some(id) if sessions.iter().any(|s| s.id == id) => Some(id),
            _ => sessions.first().map(|s| s.id.clone()),
        };
        let ids = IdClock::starting_after(highest_id(&sessions));
        tracing::debug!(sessions = sessions.len(), active = ?active, "loaded session store");
        Self {
            storage,
            sessions,
            active,
            ids,
        }
    }

    /// Creates an empty store that is never written anywhere durable.
    pub fn in_memory() -> Self {
        Self::load(Box::new(MemoryStore::new()))
    }

    /// All sessions, most recently created first.
    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    /// Returns true if there are no sessions.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Id of the active session.
    pub fn active_id(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// The active session.
    pub fn active(&self) -> Option<&ChatSession> {
        self.active.as_deref().and_then(|id| self.get(id))
    }

    /// Looks a session up by id.
    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Issues a fresh id for a session or message.
    pub fn next_id(&mut self) -> String {
        self.ids.next_id()
    }

    /// Prepends a new session and makes it active.
    ///
    /// The title is derived from `title` when given and defaults to
    /// [`DEFAULT_TITLE`]. Returns the new session's id.
    pub fn create_session(&mut self, title: Option<&str>) -> String {
        let id = self.next_id();
        let title = title.map(title_from_text).unwrap_or_else(|| DEFAULT_TITLE.to_string());
        self.sessions.insert(0, ChatSession::new(id.clone(), title, now_millis()));
        self.active = Some(id.clone());
        self.persist();
        id
    }

    /// Removes a session.
    ///
    /// If it was active, the first remaining session becomes active (or none
    /// when the list is now empty). Returns false if no such session exists.
    pub fn delete_session(&mut self, id: &str) -> bool {
        let Some(index) = self.sessions.iter().position(|s| s.id == id) else {
            return false;
        };
        self.sessions.remove(index);
        if self.active.as_deref() == Some(id) {
            self.active = self.sessions.first().map(|s| s.id.clone());
        }
        self.persist();
        true
    }

    /// Makes an existing session active. Returns false if it does not exist.
    pub fn select_session(&mut self, id: &str) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.active = Some(id.to_string());
        self.persist();
        true
    }

    /// Appends a message to a session.
    ///
    /// The first user message of a session that still carries the default
    /// title also names the session.
    pub fn push_message(&mut self, session_id: &str, message: Message) -> Result<()> {
        let session = self.session_mut(session_id)?;
        if message.role == Role::User
            && session.has_default_title()
            && !session.messages.iter().any(|m| m.role == Role::User)
        {
            session.title = title_from_text(&message.content);
        }
        session.messages.push(message);
        session.last_modified = now_millis();
        self.persist();
        Ok(())
    }

    /// Replaces the whole message list of a session.
    ///
    /// `title`, when given, renames the session; otherwise the current title
    /// is kept.
    pub fn replace_messages(
        &mut self,
        session_id: &str,
        messages: Vec<Message>,
        title: Option<String>,
    ) -> Result<()> {
        let session = self.session_mut(session_id)?;
        session.messages = messages;
        session.last_modified = now_millis();
        if let Some(title) = title {
            session.title = title;
        }
        self.persist();
        Ok(())
    }

    /// Replaces the content of one message, keyed by id.
    pub fn update_message_content(
        &mut self,
        session_id: &str,
        message_id: &str,
        content: &str,
    ) -> Result<()> {
        let session = self.session_mut(session_id)?;
        let Some(message) = session.message_mut(message_id) else {
            return Err(Error::validation(
                format!("no message {message_id} in session {session_id}"),
                Some("message_id".to_string()),
            ));
        };
        message.content.clear();
        message.content.push_str(content);
        self.persist();
        Ok(())
    }

    /// Writes the session list and active id to storage.
    ///
    /// An empty list removes both keys. Mutating methods call this
    /// themselves; a failure there is logged rather than returned.
    pub fn save(&mut self) -> Result<()> {
        STORE_SAVES.click();
        if self.sessions.is_empty() {
            self.storage.remove(SESSIONS_KEY)?;
            return self.storage.remove(LAST_ID_KEY);
        }
        let blob = serde_json::to_string(&self.sessions)?;
        self.storage.set(SESSIONS_KEY, &blob)?;
        match &self.active {
            Some(id) => self.storage.set(LAST_ID_KEY, id),
            None => self.storage.remove(LAST_ID_KEY),
        }
    }

    /// The underlying storage.
    pub fn storage(&self) -> &dyn KeyValueStore {
        self.storage.as_ref()
    }

    /// Gives the underlying storage back, dropping the in-memory copy.
    pub fn into_storage(self) -> Box<dyn KeyValueStore> {
        self.storage
    }

    fn persist(&mut self) {
        if let Err(err) = self.save() {
            STORE_SAVE_FAILURES.click();
            tracing::warn!(error = %err, "could not save sessions");
        }
    }

    fn session_mut(&mut self, id: &str) -> Result<&mut ChatSession> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| Error::validation(format!("no session {id}"), Some("session_id".to_string())))
    }
}

fn highest_id(sessions: &[ChatSession]) -> i64 {
    sessions
        .iter()
        .flat_map(|s| std::iter::once(&s.id).chain(s.messages.iter().map(|m| &m.id)))
        .filter_map(|id| id.parse::<i64>().ok())
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with(count: usize) -> (SessionStore, Vec<String>) {
        let mut store = SessionStore::in_memory();
        let ids = (0..count)
            .map(|_| store.create_session(None))
            .collect();
        (store, ids)
    }

    #[test]
    fn create_prepends_and_activates() {
        let (mut store, ids) = store_with(2);
        assert_eq!(store.sessions()[0].id, ids[1]);
        assert_eq!(store.active_id(), Some(ids[1].as_str()));

        let third = store.create_session(Some("otra"));
        assert_eq!(store.sessions()[0].id, third);
        assert_eq!(store.active_id(), Some(third.as_str()));
        assert_eq!(store.sessions()[0].title, "otra");
        assert_eq!(store.sessions()[1].title, DEFAULT_TITLE);
    }

    #[test]
    fn deleting_active_promotes_first_remaining() {
        let (mut store, ids) = store_with(3);
        // list order: ids[2], ids[1], ids[0]; active ids[2]
        assert!(store.delete_session(&ids[2]));
        assert_eq!(store.active_id(), Some(ids[1].as_str()));
        assert!(store.delete_session(&ids[1]));
        assert_eq!(store.active_id(), Some(ids[0].as_str()));
        assert!(store.delete_session(&ids[0]));
        assert_eq!(store.active_id(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn deleting_inactive_keeps_active() {
        let (mut store, ids) = store_with(3);
        assert!(store.select_session(&ids[0]));
        assert!(store.delete_session(&ids[1]));
        assert_eq!(store.active_id(), Some(ids[0].as_str()));
        assert!(!store.delete_session("missing"));
        assert_eq!(store.active_id(), Some(ids[0].as_str()));
    }

    #[test]
    fn emptying_the_list_clears_storage() {
        let (mut store, ids) = store_with(1);
        assert!(store.storage().get(SESSIONS_KEY).unwrap().is_some());
        store.delete_session(&ids[0]);
        assert_eq!(store.storage().get(SESSIONS_KEY).unwrap(), None);
        assert_eq!(store.storage().get(LAST_ID_KEY).unwrap(), None);
    }

    #[test]
    fn first_user_message_names_default_session() {
        let (mut store, ids) = store_with(1);
        let id = store.next_id();
        store
            .push_message(&ids[0], Message::user(id, "Genera un video de un gato", 1))
            .unwrap();
        assert_eq!(store.get(&ids[0]).unwrap().title, "Genera un video de un gato");

        let id = store.next_id();
        store
            .push_message(&ids[0], Message::user(id, "otra cosa", 2))
            .unwrap();
        assert_eq!(store.get(&ids[0]).unwrap().title, "Genera un video de un gato");
    }

    #[test]
    fn update_message_content_replaces_text() {
        let (mut store, ids) = store_with(1);
        let message_id = store.next_id();
        store
            .push_message(&ids[0], Message::model(message_id.clone(), "", 1))
            .unwrap();
        store.update_message_content(&ids[0], &message_id, "Hola").unwrap();
        store
            .update_message_content(&ids[0], &message_id, "Hola mundo")
            .unwrap();
        let session = store.get(&ids[0]).unwrap();
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.message(&message_id).unwrap().content, "Hola mundo");
        assert!(store.update_message_content(&ids[0], "nope", "x").is_err());
    }

    #[test]
    fn replace_messages_keeps_title_without_fallback() {
        let (mut store, ids) = store_with(1);
        store
            .replace_messages(&ids[0], vec![Message::user("1", "a", 1)], None)
            .unwrap();
        assert_eq!(store.get(&ids[0]).unwrap().title, DEFAULT_TITLE);
        store
            .replace_messages(&ids[0], Vec::new(), Some("renombrada".to_string()))
            .unwrap();
        let session = store.get(&ids[0]).unwrap();
        assert_eq!(session.title, "renombrada");
        assert!(session.messages.is_empty());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let (mut store, ids) = store_with(3);
        store.select_session(&ids[1]);
        let id = store.next_id();
        store
            .push_message(&ids[1], Message::user(id, "hola", 7))
            .unwrap();
        let before = store.sessions().to_vec();

        let reloaded = SessionStore::load(store.into_storage());
        assert_eq!(reloaded.sessions(), before.as_slice());
        assert_eq!(reloaded.active_id(), Some(ids[1].as_str()));
    }

    #[test]
    fn malformed_blob_loads_empty() {
        let mut storage = MemoryStore::new();
        storage.set(SESSIONS_KEY, "{not json").unwrap();
        storage.set(LAST_ID_KEY, "123").unwrap();
        let store = SessionStore::load(Box::new(storage));
        assert!(store.is_empty());
        assert_eq!(store.active_id(), None);
    }

    #[test]
    fn stale_last_id_falls_back_to_first() {
        let (store, ids) = store_with(2);
        let mut storage = store.into_storage();
        storage.set(LAST_ID_KEY, "does-not-exist").unwrap();
        let store = SessionStore::load(storage);
        assert_eq!(store.active_id(), Some(ids[1].as_str()));
    }

    #[test]
    fn fresh_ids_exceed_loaded_ids() {
        let mut storage = MemoryStore::new();
        storage
            .set(
                SESSIONS_KEY,
                r#"[{"id":"99999999999999","title":"t","messages":[],"lastModified":1}]"#,
            )
            .unwrap();
        let mut store = SessionStore::load(Box::new(storage));
        let next: i64 = store.next_id().parse().unwrap();
        assert!(next > 99_999_999_999_999);
    }
}
