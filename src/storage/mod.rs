//! Typed wrapper over the engine: routes mutations through the WAL and the
//! replication gate, and runs the background TTL cleanup sweeper.

use crate::engine::{Engine, Watcher};
use crate::error::{DbError, Result};
use crate::wal::{Op, Wal};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaRole {
    None,
    Master,
    Slave,
}

#[derive(Default)]
pub struct Stats {
    pub sets: AtomicU64,
    pub dels: AtomicU64,
    pub gets: AtomicU64,
    pub expired_cleanups: AtomicU64,
}

pub struct Storage {
    engine: Arc<Engine>,
    wal: Option<Arc<Wal>>,
    role: ReplicaRole,
    pub stats: Arc<Stats>,
}

impl Storage {
    pub fn new(engine: Arc<Engine>, wal: Option<Arc<Wal>>, role: ReplicaRole) -> Arc<Storage> {
        Arc::new(Storage {
            engine,
            wal,
            role,
            stats: Arc::new(Stats::default()),
        })
    }

    pub fn role(&self) -> ReplicaRole {
        self.role
    }

    /// Full namespaced key used by every caller above the engine.
    pub fn ns_key(namespace: &str, user_key: &str) -> String {
        format!("ns:{namespace}:{user_key}")
    }

    pub async fn set(&self, namespace: &str, key: &str, value: &str, ttl_absolute: u64) -> Result<()> {
        if self.role == ReplicaRole::Slave {
            return Err(DbError::InvalidOperation(
                "read-only replica".to_string(),
            ));
        }
        self.apply_set(namespace, key, value, ttl_absolute).await
    }

    pub async fn del(&self, namespace: &str, key: &str) -> Result<()> {
        if self.role == ReplicaRole::Slave {
            return Err(DbError::InvalidOperation(
                "read-only replica".to_string(),
            ));
        }
        self.apply_del(namespace, key).await
    }

    pub fn get(&self, namespace: &str, key: &str) -> Result<String> {
        self.stats.gets.fetch_add(1, Ordering::Relaxed);
        let full_key = Self::ns_key(namespace, key);
        let (value, found) = self.engine.get(&full_key);
        if found {
            Ok(value)
        } else {
            Err(DbError::KeyNotFound)
        }
    }

    pub fn watch(&self, namespace: &str, key: &str) -> Arc<Watcher> {
        let full_key = Self::ns_key(namespace, key);
        self.engine.watch(&full_key)
    }

    /// Privileged path used only by the replication applier: applies an
    /// entry to the engine directly, bypassing the replica gate and the WAL.
    pub fn apply_replicated(&self, op: Op, args: &[String]) -> Result<()> {
        match op {
            Op::Set => {
                let key = args.first().ok_or_else(|| DbError::Internal("missing key".into()))?;
                let value = args.get(1).cloned().unwrap_or_default();
                let ttl = args.get(2).and_then(|s| s.parse::<u64>().ok()).unwrap_or(0);
                self.engine.set(key, value, ttl);
            }
            Op::Del => {
                let key = args.first().ok_or_else(|| DbError::Internal("missing key".into()))?;
                self.engine.del(key);
            }
        }
        Ok(())
    }

    async fn apply_set(&self, namespace: &str, key: &str, value: &str, ttl_absolute: u64) -> Result<()> {
        let full_key = Self::ns_key(namespace, key);
        self.engine.set(&full_key, value.to_string(), ttl_absolute);
        self.stats.sets.fetch_add(1, Ordering::Relaxed);
        if let Some(wal) = &self.wal {
            wal.save(
                Op::Set,
                vec![full_key, value.to_string(), ttl_absolute.to_string()],
            )
            .await?;
        }
        Ok(())
    }

    async fn apply_del(&self, namespace: &str, key: &str) -> Result<()> {
        let full_key = Self::ns_key(namespace, key);
        self.engine.del(&full_key);
        self.stats.dels.fetch_add(1, Ordering::Relaxed);
        if let Some(wal) = &self.wal {
            wal.save(Op::Del, vec![full_key]).await?;
        }
        Ok(())
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }

    /// Spawns the background TTL cleanup sweeper; a no-op if `period` is
    /// zero. Takes `Arc<Storage>` by value; callers that still need the
    /// handle should clone it first.
    pub fn spawn_cleanup_sweeper(self: Arc<Self>, period: Duration, batch_size: usize) {
        if period.is_zero() {
            return;
        }
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = self.engine.sweep_expired(batch_size);
                if removed > 0 {
                    self.stats.expired_cleanups.fetch_add(removed as u64, Ordering::Relaxed);
                    tracing::debug!(removed, "cleanup sweeper removed expired keys");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_storage() -> Arc<Storage> {
        Storage::new(Arc::new(Engine::new(4)), None, ReplicaRole::None)
    }

    #[tokio::test]
    async fn set_get_del_through_facade() {
        let storage = test_storage();
        storage.set("default", "k", "v", 0).await.unwrap();
        assert_eq!(storage.get("default", "k").unwrap(), "v");
        storage.del("default", "k").await.unwrap();
        assert!(matches!(storage.get("default", "k"), Err(DbError::KeyNotFound)));
    }

    #[tokio::test]
    async fn slave_rejects_client_mutations() {
        let storage = Storage::new(Arc::new(Engine::new(1)), None, ReplicaRole::Slave);
        let result = storage.set("default", "k", "v", 0).await;
        assert!(matches!(result, Err(DbError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn slave_rejection_wire_text_has_no_extra_context() {
        let storage = Storage::new(Arc::new(Engine::new(1)), None, ReplicaRole::Slave);
        let err = storage.set("default", "k", "v", 0).await.unwrap_err();
        assert_eq!(err.wire_message(), "invalid operation");
    }

    #[tokio::test]
    async fn replicated_apply_bypasses_the_gate() {
        let storage = Storage::new(Arc::new(Engine::new(1)), None, ReplicaRole::Slave);
        storage
            .apply_replicated(Op::Set, &["ns:default:k".to_string(), "v".to_string(), "0".to_string()])
            .unwrap();
        assert_eq!(storage.get("default", "k").unwrap(), "v");
    }

    #[tokio::test]
    async fn namespaces_isolate_keys() {
        let storage = test_storage();
        storage.set("default", "k", "a", 0).await.unwrap();
        storage.set("app", "k", "b", 0).await.unwrap();
        assert_eq!(storage.get("default", "k").unwrap(), "a");
        assert_eq!(storage.get("app", "k").unwrap(), "b");
    }
}
