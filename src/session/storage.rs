//! Session record storage.

use super::{Session, SessionId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Keyed storage of live session records.
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session.
    fn add(&self, session: Session);

    /// Look up a session by ID.
    fn find(&self, id: &SessionId) -> Option<Session>;

    /// Remove a session, returning it if it was present.
    fn remove(&self, id: &SessionId) -> Option<Session>;

    /// Snapshot of all stored sessions.
    fn get_all(&self) -> Vec<Session>;

    /// Number of stored sessions.
    fn len(&self) -> usize;

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory session store.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemorySessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn add(&self, session: Session) {
        self.sessions.write().insert(session.id.clone(), session);
    }

    fn find(&self, id: &SessionId) -> Option<Session> {
        self.sessions.read().get(id).cloned()
    }

    fn remove(&self, id: &SessionId) -> Option<Session> {
        self.sessions.write().remove(id)
    }

    fn get_all(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.sessions.read().len()
    }
}
