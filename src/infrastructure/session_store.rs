use crate::domain::error::{AppError, Result};
use crate::domain::generation_session::GenerationSession;
use std::collections::HashMap;
use std::sync::RwLock;

/// Metadata of completed generation runs, keyed by session id.
pub trait SessionStore: Send + Sync {
    fn create(&self, session: GenerationSession) -> Result<()>;
    fn fetch(&self, id: &str) -> Result<Option<GenerationSession>>;
    fn evict(&self, id: &str) -> Result<Option<GenerationSession>>;
    fn len(&self) -> Result<usize>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, GenerationSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E>(_: E) -> AppError {
    AppError::Internal("Session store lock poisoned".to_string())
}

impl SessionStore for InMemorySessionStore {
    fn create(&self, session: GenerationSession) -> Result<()> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        if sessions.contains_key(&session.id) {
            return Err(AppError::ValidationError(format!(
                "Session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    fn fetch(&self, id: &str) -> Result<Option<GenerationSession>> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.get(id).cloned())
    }

    fn evict(&self, id: &str) -> Result<Option<GenerationSession>> {
        let mut sessions = self.sessions.write().map_err(poisoned)?;
        Ok(sessions.remove(id))
    }

    fn len(&self) -> Result<usize> {
        let sessions = self.sessions.read().map_err(poisoned)?;
        Ok(sessions.len())
    }
}
