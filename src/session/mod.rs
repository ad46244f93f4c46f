//! In-memory per-connection sessions.

use crate::identity::Role;
use parking_lot::RwLock;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;

const SESSION_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SESSION_ID_LEN: usize = 16;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub username: Option<String>,
    pub namespace: String,
    pub current_role: Option<Role>,
}

impl Session {
    fn new(id: String) -> Session {
        Session {
            id,
            username: None,
            namespace: "default".to_string(),
            current_role: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.username.is_some()
    }
}

fn generate_session_id() -> String {
    let mut rng = rand::rng();
    (0..SESSION_ID_LEN)
        .map(|_| {
            let idx = rng.random_range(0..SESSION_ID_ALPHABET.len());
            SESSION_ID_ALPHABET[idx] as char
        })
        .collect()
}

/// Tracks every live session by id, guarded by a single mutex; sessions are
/// never held across I/O.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<RwLock<Session>>>>,
}

impl SessionManager {
    pub fn new() -> Arc<SessionManager> {
        Arc::new(SessionManager {
            sessions: RwLock::new(HashMap::new()),
        })
    }

    pub fn create(&self) -> Arc<RwLock<Session>> {
        let id = generate_session_id();
        let session = Arc::new(RwLock::new(Session::new(id.clone())));
        self.sessions.write().insert(id, session.clone());
        session
    }

    pub fn remove(&self, id: &str) {
        self.sessions.write().remove(id);
    }

    pub fn count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }
}
