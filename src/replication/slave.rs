use super::frame;
use crate::storage::Storage;
use crate::wal::{decode_segment, SegmentStorage};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

/// Fetches WAL segments from a master and applies them to the local
/// engine via the storage façade's privileged replication path.
pub struct Slave {
    master_address: String,
    segments: Arc<SegmentStorage>,
    storage: Arc<Storage>,
    sync_interval: Duration,
    last_acked_segment_id: AtomicU64,
}

impl Slave {
    pub fn new(
        master_address: String,
        segments: Arc<SegmentStorage>,
        storage: Arc<Storage>,
        sync_interval: Duration,
    ) -> crate::error::Result<Arc<Slave>> {
        let last_acked = segments.highest_id()?;
        Ok(Arc::new(Slave {
            master_address,
            segments,
            storage,
            sync_interval,
            last_acked_segment_id: AtomicU64::new(last_acked),
        }))
    }

    pub fn spawn(self: Arc<Self>) {
        tokio::spawn(async move {
            self.run().await;
        });
    }

    async fn run(self: Arc<Self>) {
        let idle_timeout = self.sync_interval * 3;
        loop {
            tokio::time::sleep(self.sync_interval).await;
            match tokio::time::timeout(idle_timeout, self.sync_once()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "replication sync failed, backing off"),
                Err(_) => tracing::warn!(timeout = ?idle_timeout, "replication sync timed out, backing off"),
            }
        }
    }

    async fn sync_once(&self) -> crate::error::Result<()> {
        let next_id = self.last_acked_segment_id.load(Ordering::SeqCst) + 1;
        let mut stream = TcpStream::connect(&self.master_address).await?;
        frame::write_request(&mut stream, next_id as u32).await?;
        let Some(response) = frame::read_response(&mut stream).await? else {
            return Ok(());
        };
        self.segments
            .write_whole(response.segment_id as u64, &response.bytes, response.compressed)?;

        let bytes = if response.compressed {
            use std::io::Read;
            let mut decoder = flate2::read::GzDecoder::new(&response.bytes[..]);
            let mut out = Vec::new();
            decoder.read_to_end(&mut out)?;
            out
        } else {
            response.bytes
        };

        let storage = &self.storage;
        decode_segment(&bytes, |op, args| storage.apply_replicated(op, args))?;
        self.last_acked_segment_id.store(response.segment_id as u64, Ordering::SeqCst);
        Ok(())
    }
}
