//! Bounded-concurrency TCP accept loop and per-connection lifecycle.

use crate::database::Database;
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

pub struct ServerConfig {
    pub address: String,
    pub max_connections: usize,
    pub max_message_size: usize,
    pub idle_timeout: Duration,
}

pub struct Server {
    db: Arc<Database>,
    config: ServerConfig,
}

impl Server {
    pub fn new(db: Arc<Database>, config: ServerConfig) -> Server {
        Server { db, config }
    }

    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.address).await?;
        self.run_on(listener).await
    }

    /// Like `run`, but serves an already-bound listener instead of binding
    /// `config.address` itself. Lets tests claim an ephemeral port without
    /// a bind/drop/rebind race.
    pub async fn run_on(self, listener: TcpListener) -> Result<()> {
        tracing::info!(address = %self.config.address, "server listening");
        let semaphore = Arc::new(Semaphore::new(self.config.max_connections.max(1)));
        let max_message_size = self.config.max_message_size;
        let idle_timeout = self.config.idle_timeout;
        let db = self.db;

        loop {
            let (stream, peer) = listener.accept().await?;
            // Blocks at the semaphore, not in an unbounded queue, once
            // `max_connections` sessions are already live.
            let permit = semaphore.clone().acquire_owned().await;
            let db = db.clone();

            tokio::spawn(async move {
                let _permit = permit;
                let session = db.sessions.create();
                let session_id = session.read().id.clone();
                tracing::debug!(%peer, session_id, "connection accepted");

                // A panic inside the handler unwinds this spawned task only;
                // tokio reports it as a JoinError rather than tearing down
                // the listener or any other connection.
                let handler = tokio::spawn(handle_connection(
                    stream,
                    db.clone(),
                    session.clone(),
                    max_message_size,
                    idle_timeout,
                ));
                match handler.await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!(%peer, session_id, error = %e, "connection ended with error"),
                    Err(join_error) => {
                        tracing::error!(%peer, session_id, %join_error, "connection handler panicked")
                    }
                }

                db.sessions.remove(&session_id);
                tracing::debug!(%peer, session_id, "connection closed");
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    db: Arc<Database>,
    session: Arc<parking_lot::RwLock<crate::session::Session>>,
    max_message_size: usize,
    idle_timeout: Duration,
) -> Result<()> {
    let mut buf = vec![0u8; max_message_size];

    loop {
        let read_result = tokio::time::timeout(idle_timeout, stream.read(&mut buf)).await;
        let n = match read_result {
            Ok(Ok(n)) => n,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::debug!("connection idle timeout");
                return Ok(());
            }
        };
        if n == 0 {
            return Ok(()); // EOF
        }
        if n == max_message_size {
            // A read that exactly fills the buffer is a buffer overflow:
            // close the connection without a response.
            return Ok(());
        }

        let text = String::from_utf8_lossy(&buf[..n]);
        let response = db.handle_line(&session, text.trim_end_matches(['\r', '\n'])).await;
        stream.write_all(response.as_bytes()).await?;
        stream.write_all(b"\n").await?;
    }
}
