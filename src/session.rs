//! Sessions and the message store boundary
//!
//! The engine consumes the session store through a narrow interface: get a
//! session, append a message, extend the last message with a streamed
//! fragment. Persistence beyond process lifetime is out of scope; the
//! in-memory store below is the default implementation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FlowError, FlowResult};
use crate::llm::Role;

/// Reference to a previously-uploaded tabular file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileInfo {
    pub filename: String,
    pub filepath: PathBuf,
}

impl FileInfo {
    pub fn new(filename: impl Into<String>, filepath: impl AsRef<Path>) -> Self {
        Self {
            filename: filename.into(),
            filepath: filepath.as_ref().to_path_buf(),
        }
    }
}

/// One message in a session transcript. Assistant messages also accumulate
/// the thinking fragments streamed before the reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A chat session carrying the uploaded file reference and the transcript
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub file_info: Option<FileInfo>,
    pub messages: Vec<SessionMessage>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            file_info: None,
            messages: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Narrow session-store interface consumed by the engine
pub trait SessionStore: Send + Sync {
    fn create(&self) -> Session;

    fn get(&self, id: Uuid) -> Option<Session>;

    fn set_file_info(&self, id: Uuid, file_info: FileInfo) -> FlowResult<()>;

    fn append_message(&self, id: Uuid, role: Role, content: &str) -> FlowResult<()>;

    /// Concatenate a streamed fragment onto the session's last message
    fn update_last_message(&self, id: Uuid, fragment: &str) -> FlowResult<()>;

    /// Concatenate a streamed fragment onto the last message's thinking text
    fn update_last_thinking(&self, id: Uuid, fragment: &str) -> FlowResult<()>;
}

/// In-memory session store
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self) -> Session {
        let session = Session::new();
        self.sessions.write().insert(session.id, session.clone());
        session
    }

    fn get(&self, id: Uuid) -> Option<Session> {
        self.sessions.read().get(&id).cloned()
    }

    fn set_file_info(&self, id: Uuid, file_info: FileInfo) -> FlowResult<()> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id).ok_or(FlowError::SessionNotFound(id))?;
        session.file_info = Some(file_info);
        Ok(())
    }

    fn append_message(&self, id: Uuid, role: Role, content: &str) -> FlowResult<()> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id).ok_or(FlowError::SessionNotFound(id))?;
        session.messages.push(SessionMessage {
            role,
            content: content.to_string(),
            thinking: None,
            created_at: Utc::now(),
        });
        Ok(())
    }

    fn update_last_message(&self, id: Uuid, fragment: &str) -> FlowResult<()> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id).ok_or(FlowError::SessionNotFound(id))?;
        let last = session.messages.last_mut().ok_or(FlowError::EmptySession)?;
        last.content.push_str(fragment);
        Ok(())
    }

    fn update_last_thinking(&self, id: Uuid, fragment: &str) -> FlowResult<()> {
        let mut sessions = self.sessions.write();
        let session = sessions.get_mut(&id).ok_or(FlowError::SessionNotFound(id))?;
        let last = session.messages.last_mut().ok_or(FlowError::EmptySession)?;
        last.thinking.get_or_insert_with(String::new).push_str(fragment);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_get() {
        let store = MemorySessionStore::new();
        let session = store.create();
        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.id, session.id);
        assert!(fetched.file_info.is_none());
        assert!(fetched.messages.is_empty());
    }

    #[test]
    fn test_append_and_update_last() {
        let store = MemorySessionStore::new();
        let session = store.create();

        store
            .append_message(session.id, Role::User, "hello")
            .unwrap();
        store.append_message(session.id, Role::Assistant, "").unwrap();
        store.update_last_message(session.id, "part one ").unwrap();
        store.update_last_message(session.id, "part two").unwrap();

        let fetched = store.get(session.id).unwrap();
        assert_eq!(fetched.messages.len(), 2);
        assert_eq!(fetched.messages[1].content, "part one part two");
    }

    #[test]
    fn test_thinking_accumulates_on_last_message() {
        let store = MemorySessionStore::new();
        let session = store.create();
        store.append_message(session.id, Role::Assistant, "").unwrap();

        store.update_last_thinking(session.id, "Loading data...\n").unwrap();
        store.update_last_thinking(session.id, "Running code...\n").unwrap();
        store.update_last_message(session.id, "done").unwrap();

        let fetched = store.get(session.id).unwrap();
        let last = &fetched.messages[0];
        assert_eq!(
            last.thinking.as_deref(),
            Some("Loading data...\nRunning code...\n")
        );
        assert_eq!(last.content, "done");
    }

    #[test]
    fn test_unknown_session_errors() {
        let store = MemorySessionStore::new();
        let err = store
            .append_message(Uuid::new_v4(), Role::User, "x")
            .unwrap_err();
        assert!(matches!(err, FlowError::SessionNotFound(_)));
    }

    #[test]
    fn test_update_last_on_empty_transcript() {
        let store = MemorySessionStore::new();
        let session = store.create();
        let err = store.update_last_message(session.id, "x").unwrap_err();
        assert!(matches!(err, FlowError::EmptySession));
    }
}
