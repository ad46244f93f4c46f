use super::frame::{self, SegmentFrame};
use crate::wal::SegmentStorage;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

/// Streams WAL segments to connected slaves. Never deletes a segment that
/// may still be requested -- segment retention is the WAL's rotation
/// policy, not the master's concern.
pub struct Master {
    storage: Arc<SegmentStorage>,
    max_replicas: usize,
}

impl Master {
    pub fn new(storage: Arc<SegmentStorage>, max_replicas: usize) -> Arc<Master> {
        Arc::new(Master { storage, max_replicas })
    }

    pub async fn serve(self: Arc<Self>, address: &str) -> crate::error::Result<()> {
        let listener = TcpListener::bind(address).await?;
        tracing::info!(address, "replication master listening");
        self.serve_on(listener).await
    }

    pub async fn serve_on(self: Arc<Self>, listener: TcpListener) -> crate::error::Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.max_replicas.max(1)));
        loop {
            let (stream, peer) = listener.accept().await?;
            let permit = semaphore.clone().acquire_owned().await;
            let master = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                if let Err(e) = master.serve_connection(stream).await {
                    tracing::debug!(%peer, error = %e, "replication connection ended");
                }
            });
        }
    }

    async fn serve_connection(&self, mut stream: TcpStream) -> crate::error::Result<()> {
        loop {
            let requested = frame::read_request(&mut stream).await?;
            let frame = match self.storage.exists(requested as u64) {
                true => {
                    let (bytes, compressed) = self.storage.read(requested as u64)?;
                    Some(SegmentFrame { segment_id: requested, compressed, bytes })
                }
                false => None,
            };
            frame::write_response(&mut stream, frame.as_ref()).await?;
        }
    }
}
