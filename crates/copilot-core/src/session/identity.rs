use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use super::storage::{SessionStore, StorageError};

pub const COPILOT_SESSION_KEY: &str = "copilot.agent.session_id";

/// Hands out the durable conversation identifier.
///
/// The identifier is read back from storage on every acquisition so that a
/// value persisted by an earlier process (or an earlier rotation) wins. When
/// storage cannot be used the identity degrades to an id that only lives for
/// this process.
pub struct SessionIdentity {
    store: Arc<dyn SessionStore>,
    current: Option<String>,
    persisted: bool,
}

impl SessionIdentity {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            current: None,
            persisted: false,
        }
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Whether the current identifier made it into durable storage.
    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    pub fn acquire(&mut self) -> String {
        match self.store.read(COPILOT_SESSION_KEY) {
            Ok(Some(stored)) if !stored.trim().is_empty() => {
                let stored = stored.trim().to_string();
                debug!(session_id = %stored, "reusing stored session id");
                self.persisted = true;
                self.current = Some(stored.clone());
                stored
            }
            Ok(_) => match &self.current {
                // Writes are failing; keep the unpersisted id for the rest of the process.
                Some(current) if !self.persisted => current.clone(),
                _ => self.issue_new(),
            },
            Err(StorageError::InvalidData(message)) => {
                warn!("stored session id is unreadable, issuing a new one: {message}");
                self.issue_new()
            }
            Err(err) => {
                if let Some(current) = &self.current {
                    return current.clone();
                }
                warn!("{err}; session will not survive a restart");
                let session_id = generate_session_id();
                self.persisted = false;
                self.current = Some(session_id.clone());
                session_id
            }
        }
    }

    pub fn rotate(&mut self) -> String {
        self.issue_new()
    }

    fn issue_new(&mut self) -> String {
        let session_id = generate_session_id();
        self.persisted = match self.store.write(COPILOT_SESSION_KEY, &session_id) {
            Ok(()) => true,
            Err(err) => {
                warn!("{err}; session will not survive a restart");
                false
            }
        };
        debug!(session_id = %session_id, persisted = self.persisted, "issued session id");
        self.current = Some(session_id.clone());
        session_id
    }
}

fn generate_session_id() -> String {
    Uuid::new_v4().to_string()
}
