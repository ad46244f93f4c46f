//! Orchestrates parser -> authorization -> handler dispatch -> response
//! wrapping. This is the layer a connection handler calls once per request.

mod handlers;

use crate::compute::parse_command;
use crate::error::{DbError, Result};
use crate::identity::Identity;
use crate::session::{Session, SessionManager};
use crate::storage::Storage;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

pub struct Database {
    pub storage: Arc<Storage>,
    pub identity: Identity,
    pub sessions: Arc<SessionManager>,
    pub root_username: String,
    /// Bounds how long a blocking operation (currently just `WATCH`) may
    /// suspend a connection's task -- mirrors the network layer's idle
    /// deadline, since there's no separate cancellation signal threaded
    /// down from the socket.
    pub watch_deadline: Duration,
}

impl Database {
    pub fn new(
        storage: Arc<Storage>,
        sessions: Arc<SessionManager>,
        root_username: String,
        watch_deadline: Duration,
    ) -> Database {
        let identity = Identity::new(storage.clone());
        Database {
            storage,
            identity,
            sessions,
            root_username,
            watch_deadline,
        }
    }

    /// Handles one raw request line for `session`, returning the wire
    /// response text (`[ok] ...` or `[error] ...`, without the trailing
    /// newline -- the caller appends it).
    pub async fn handle_line(&self, session: &Arc<RwLock<Session>>, line: &str) -> String {
        match self.dispatch(session, line).await {
            Ok(payload) if payload.is_empty() => "[ok]".to_string(),
            Ok(payload) => format!("[ok] {payload}"),
            Err(e) => format!("[error] {}", e.wire_message()),
        }
    }

    async fn dispatch(&self, session: &Arc<RwLock<Session>>, line: &str) -> Result<String> {
        let command = parse_command(line)?;

        let authenticated = session.read().is_authenticated();
        if command.name != "AUTH" && !authenticated {
            return Err(DbError::AuthenticationRequired);
        }

        handlers::dispatch(self, session, &command).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Engine;
    use crate::storage::ReplicaRole;

    async fn test_database() -> Database {
        let storage = Storage::new(Arc::new(Engine::new(4)), None, ReplicaRole::None);
        let sessions = SessionManager::new();
        let db = Database::new(storage, sessions, "root".to_string(), Duration::from_secs(300));
        db.identity
            .bootstrap("root", "root", &[], &[], &[])
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn watch_is_bounded_by_the_idle_deadline_not_left_hanging() {
        let storage = Storage::new(Arc::new(Engine::new(1)), None, ReplicaRole::None);
        let sessions = SessionManager::new();
        let db = Database::new(storage, sessions, "root".to_string(), Duration::from_millis(20));
        db.identity.bootstrap("root", "root", &[], &[], &[]).await.unwrap();
        let session = db.sessions.create();
        db.handle_line(&session, "AUTH root root").await;

        let response = tokio::time::timeout(Duration::from_secs(2), db.handle_line(&session, "WATCH foo"))
            .await
            .expect("WATCH must return once its deadline elapses, not hang forever");
        assert_eq!(response, "[ok]");
    }

    #[tokio::test]
    async fn scenario_s1_set_get_del() {
        let db = test_database().await;
        let session = db.sessions.create();
        assert_eq!(db.handle_line(&session, "AUTH root root").await, "[ok] authentication successful");
        assert_eq!(db.handle_line(&session, "SET foo bar").await, "[ok]");
        assert_eq!(db.handle_line(&session, "GET foo").await, "[ok] bar");
        assert_eq!(db.handle_line(&session, "DEL foo").await, "[ok]");
        assert_eq!(db.handle_line(&session, "GET foo").await, "[error] key not found");
    }

    #[tokio::test]
    async fn scenario_s2_namespace_permission_boundary() {
        let db = test_database().await;
        let root_session = db.sessions.create();
        db.handle_line(&root_session, "AUTH root root").await;
        db.handle_line(&root_session, "CREATE NAMESPACE app").await;
        db.handle_line(&root_session, "CREATE ROLE reader rw app").await;
        db.handle_line(&root_session, "CREATE USER u1 p1").await;
        assert_eq!(db.handle_line(&root_session, "ASSIGN ROLE u1 reader").await, "[ok]");

        let user_session = db.sessions.create();
        assert_eq!(
            db.handle_line(&user_session, "AUTH u1 p1").await,
            "[ok] authentication successful"
        );
        assert_eq!(db.handle_line(&user_session, "SET k v NS=app").await, "[ok]");
        assert_eq!(
            db.handle_line(&user_session, "SET k v NS=default").await,
            "[error] permission denied"
        );
    }

    #[tokio::test]
    async fn property_9_auth_required_on_fresh_session() {
        let db = test_database().await;
        let session = db.sessions.create();
        assert_eq!(
            db.handle_line(&session, "SET foo bar").await,
            "[error] authentication required"
        );
    }

    #[tokio::test]
    async fn property_10_permission_check_is_per_namespace() {
        let db = test_database().await;
        let root_session = db.sessions.create();
        db.handle_line(&root_session, "AUTH root root").await;
        db.handle_line(&root_session, "CREATE NAMESPACE app").await;
        db.handle_line(&root_session, "CREATE ROLE reader r app").await;
        db.handle_line(&root_session, "CREATE USER u1 p1").await;
        db.handle_line(&root_session, "ASSIGN ROLE u1 reader").await;

        let session = db.sessions.create();
        db.handle_line(&session, "AUTH u1 p1").await;
        assert_eq!(db.handle_line(&session, "GET k NS=app").await, "[error] key not found");
        assert_eq!(
            db.handle_line(&session, "SET k v NS=app").await,
            "[error] permission denied"
        );
    }

    #[tokio::test]
    async fn create_role_rejects_garbage_permissions() {
        let db = test_database().await;
        let root_session = db.sessions.create();
        db.handle_line(&root_session, "AUTH root root").await;
        db.handle_line(&root_session, "CREATE NAMESPACE app").await;
        assert_eq!(
            db.handle_line(&root_session, "CREATE ROLE reader zzz app").await,
            "[error] invalid permissions: zzz"
        );
    }

    #[tokio::test]
    async fn non_root_cannot_run_admin_commands() {
        let db = test_database().await;
        let root_session = db.sessions.create();
        db.handle_line(&root_session, "AUTH root root").await;
        db.handle_line(&root_session, "CREATE USER u1 p1").await;

        let session = db.sessions.create();
        db.handle_line(&session, "AUTH u1 p1").await;
        assert_eq!(
            db.handle_line(&session, "CREATE USER u2 p2").await,
            "[error] permission denied"
        );
    }
}
