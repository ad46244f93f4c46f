//! Append-only, segmented, group-committing write-ahead log.

mod record;
mod segment;

pub use record::{decode, encode, Entry, Op};
pub use segment::SegmentStorage;

use crate::error::{DbError, Result};
use bytes::{Buf, BytesMut};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct WalConfig {
    pub data_dir: String,
    pub max_segment_size: u64,
    pub flushing_batch_size: usize,
    pub flushing_batch_timeout: Duration,
    pub compression: Compression,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
}

impl Default for WalConfig {
    fn default() -> Self {
        WalConfig {
            data_dir: "./data/wal".to_string(),
            max_segment_size: 64 * 1024 * 1024,
            flushing_batch_size: 100,
            flushing_batch_timeout: Duration::from_millis(20),
            compression: Compression::None,
        }
    }
}

struct PendingWrite {
    entry: Entry,
    ack: oneshot::Sender<Result<()>>,
}

struct CurrentSegment {
    id: u64,
    size: u64,
}

/// The durability and ordering primitive for mutations.
pub struct Wal {
    storage: Arc<SegmentStorage>,
    config: WalConfig,
    next_lsn: AtomicU64,
    sender: Mutex<Option<mpsc::Sender<PendingWrite>>>,
}

impl Wal {
    pub fn open(config: WalConfig) -> Result<Arc<Wal>> {
        let storage = Arc::new(SegmentStorage::new(config.data_dir.clone())?);
        let next_lsn = AtomicU64::new(1);
        Ok(Arc::new(Wal {
            storage,
            config,
            next_lsn,
            sender: Mutex::new(None),
        }))
    }

    /// Iterates existing segments in id order, decoding every entry and
    /// invoking `apply`. Also advances the internal LSN counter past the
    /// highest LSN observed, so freshly started WALs continue numbering.
    pub fn recover(&self, mut apply: impl FnMut(Op, &[String]) -> Result<()>) -> Result<()> {
        let mut max_lsn = 0u64;
        for (id, _compressed) in self.storage.list()? {
            let (bytes, _was_compressed) = self.storage.read(id)?;
            let mut cursor: &[u8] = &bytes;
            while cursor.has_remaining() {
                match record::decode(&mut cursor)? {
                    Some(entry) => {
                        max_lsn = max_lsn.max(entry.lsn);
                        apply(entry.op, &entry.args)?;
                    }
                    None => break,
                }
            }
        }
        self.next_lsn.store(max_lsn + 1, Ordering::SeqCst);
        Ok(())
    }

    /// Starts the batching loop. Safe to call once. Takes `Arc<Wal>` by
    /// value; callers that still need the handle should clone it first.
    pub fn start(self: Arc<Self>) {
        let (tx, rx) = mpsc::channel(4096);
        *self.sender.lock() = Some(tx);
        tokio::spawn(async move {
            self.batcher_loop(rx).await;
        });
    }

    /// Enqueues an entry; the returned future resolves once the entry is
    /// durable (or the whole batch failed).
    pub async fn save(&self, op: Op, args: Vec<String>) -> Result<()> {
        let lsn = self.next_lsn.fetch_add(1, Ordering::SeqCst);
        let entry = Entry { lsn, op, args };
        let (ack_tx, ack_rx) = oneshot::channel();
        let sender = {
            let guard = self.sender.lock();
            guard.clone()
        };
        let Some(sender) = sender else {
            return Err(DbError::Internal("WAL not started".to_string()));
        };
        sender
            .send(PendingWrite { entry, ack: ack_tx })
            .await
            .map_err(|_| DbError::Internal("WAL batcher stopped".to_string()))?;
        ack_rx
            .await
            .map_err(|_| DbError::Internal("WAL batcher dropped ack".to_string()))?
    }

    /// Flushes any pending batch and closes the current segment. The
    /// batcher task exits once the channel is dropped.
    pub fn close(&self) {
        *self.sender.lock() = None;
    }

    async fn batcher_loop(&self, mut rx: mpsc::Receiver<PendingWrite>) {
        let mut current = self.load_current_segment().unwrap_or(CurrentSegment { id: 1, size: 0 });
        loop {
            let mut batch = Vec::new();
            let Some(first) = rx.recv().await else {
                break;
            };
            batch.push(first);
            let deadline = Instant::now() + self.config.flushing_batch_timeout;
            while batch.len() < self.config.flushing_batch_size {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }
                match tokio::time::timeout(remaining, rx.recv()).await {
                    Ok(Some(next)) => batch.push(next),
                    Ok(None) => break,
                    Err(_) => break,
                }
            }
            let result = self.flush_batch(&mut current, &batch);
            for pending in batch {
                let _ = pending.ack.send(match &result {
                    Ok(()) => Ok(()),
                    Err(e) => Err(DbError::Internal(e.to_string())),
                });
            }
        }
    }

    fn flush_batch(&self, current: &mut CurrentSegment, batch: &[PendingWrite]) -> Result<()> {
        let mut buf = BytesMut::new();
        for pending in batch {
            record::encode(&pending.entry, &mut buf);
        }
        let slack = self.config.max_segment_size / 10;
        if current.size + slack + buf.len() as u64 > self.config.max_segment_size && current.size > 0 {
            self.rotate(current)?;
        }
        self.storage.append(current.id, &buf)?;
        current.size += buf.len() as u64;
        Ok(())
    }

    fn rotate(&self, current: &mut CurrentSegment) -> Result<()> {
        let outgoing = current.id;
        current.id += 1;
        current.size = 0;
        if self.config.compression == Compression::Gzip {
            if let Err(e) = self.storage.compress_in_place(outgoing) {
                tracing::warn!(segment = outgoing, error = %e, "segment compression failed; leaving uncompressed");
            }
        }
        Ok(())
    }

    fn load_current_segment(&self) -> Result<CurrentSegment> {
        let highest = self.storage.highest_id()?;
        if highest == 0 {
            return Ok(CurrentSegment { id: 1, size: 0 });
        }
        let size = self.storage.size(highest)?;
        Ok(CurrentSegment { id: highest, size })
    }

    pub fn storage(&self) -> &Arc<SegmentStorage> {
        &self.storage
    }
}

/// Decodes every entry in a raw (already-decompressed) segment buffer and
/// invokes `apply` for each, in encoded order. Shared by local recovery and
/// by the replication applier on a slave.
pub fn decode_segment(bytes: &[u8], mut apply: impl FnMut(Op, &[String]) -> Result<()>) -> Result<()> {
    let mut cursor: &[u8] = bytes;
    while cursor.has_remaining() {
        match record::decode(&mut cursor)? {
            Some(entry) => apply(entry.op, &entry.args)?,
            None => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> WalConfig {
        WalConfig {
            data_dir: dir.path().to_string_lossy().to_string(),
            max_segment_size: 1024 * 1024,
            flushing_batch_size: 4,
            flushing_batch_timeout: Duration::from_millis(10),
            compression: Compression::None,
        }
    }

    #[tokio::test]
    async fn save_then_recover_replays_in_order() {
        let dir = TempDir::new().unwrap();
        let wal = Wal::open(config(&dir)).unwrap();
        wal.clone().start();
        wal.save(Op::Set, vec!["k1".into(), "v1".into()]).await.unwrap();
        wal.save(Op::Set, vec!["k2".into(), "v2".into()]).await.unwrap();
        wal.save(Op::Del, vec!["k1".into()]).await.unwrap();
        wal.close();

        let wal2 = Wal::open(config(&dir)).unwrap();
        let mut replayed = Vec::new();
        wal2.recover(|op, args| {
            replayed.push((op, args.to_vec()));
            Ok(())
        })
        .unwrap();
        assert_eq!(replayed.len(), 3);
        assert_eq!(replayed[0].1, vec!["k1", "v1"]);
        assert_eq!(replayed[2].0, Op::Del);
    }

    #[tokio::test]
    async fn concurrent_batch_all_succeed_together() {
        let dir = TempDir::new().unwrap();
        let wal = Wal::open(config(&dir)).unwrap();
        wal.clone().start();
        let mut handles = Vec::new();
        for i in 0..4 {
            let wal = wal.clone();
            handles.push(tokio::spawn(async move {
                wal.save(Op::Set, vec![format!("k{i}"), "v".into()]).await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let segments = wal.storage().list().unwrap();
        assert_eq!(segments.len(), 1);
    }
}
