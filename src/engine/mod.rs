//! Sharded in-memory key-value store with per-key TTL and change watchers.

mod partition;
mod watch;

pub use watch::Watcher;

use partition::Partition;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A stored value together with its absolute expiry (0 = no TTL).
#[derive(Debug, Clone)]
pub struct Record {
    pub value: String,
    pub expires_at: u64,
}

impl Record {
    fn is_expired(&self, now: u64) -> bool {
        self.expires_at > 0 && now > self.expires_at
    }
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn fnv1a(key: &str) -> u32 {
    const OFFSET: u32 = 0x811c9dc5;
    const PRIME: u32 = 0x01000193;
    let mut hash = OFFSET;
    for b in key.as_bytes() {
        hash ^= *b as u32;
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

/// A fixed `P`-way partitioned in-memory map.
pub struct Engine {
    partitions: Vec<Arc<Partition>>,
}

impl Engine {
    pub fn new(partition_num: usize) -> Self {
        let partition_num = partition_num.max(1);
        let partitions = (0..partition_num).map(|_| Arc::new(Partition::new())).collect();
        Engine { partitions }
    }

    fn partition_for(&self, key: &str) -> &Arc<Partition> {
        let idx = (fnv1a(key) as usize) % self.partitions.len();
        &self.partitions[idx]
    }

    pub fn set(&self, key: &str, value: String, expires_at: u64) {
        self.partition_for(key).set(key, value, expires_at);
    }

    /// Returns `(value, found)`, applying lazy TTL expiry.
    pub fn get(&self, key: &str) -> (String, bool) {
        self.partition_for(key).get(key, now_unix())
    }

    pub fn del(&self, key: &str) {
        self.partition_for(key).del(key);
    }

    /// Registers a watcher on `key`; it resolves with the next value written.
    pub fn watch(&self, key: &str) -> Arc<Watcher> {
        self.partition_for(key).watch(key)
    }

    /// Removes expired keys across all partitions, up to `batch_size` per
    /// partition per call. Returns the number of keys removed.
    pub fn sweep_expired(&self, batch_size: usize) -> usize {
        let now = now_unix();
        self.partitions.iter().map(|p| p.sweep_expired(now, batch_size)).sum()
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_del_round_trip() {
        let engine = Engine::new(4);
        engine.set("k", "v".to_string(), 0);
        assert_eq!(engine.get("k"), ("v".to_string(), true));
        engine.del("k");
        assert_eq!(engine.get("k"), (String::new(), false));
    }

    #[test]
    fn del_on_absent_key_is_a_no_op() {
        let engine = Engine::new(1);
        engine.del("missing");
        assert_eq!(engine.get("missing"), (String::new(), false));
    }

    #[test]
    fn ttl_expiry_is_lazy() {
        let engine = Engine::new(1);
        let now = now_unix();
        engine.set("k", "v".to_string(), now);
        // expires_at == now means "expired the instant now() > expires_at";
        // use an already-past timestamp to avoid a flaky boundary.
        engine.set("k2", "v2".to_string(), now.saturating_sub(10));
        assert_eq!(engine.get("k2"), (String::new(), false));
    }

    #[test]
    fn partition_routing_is_stable() {
        let engine = Engine::new(8);
        engine.set("stable-key", "1".to_string(), 0);
        assert_eq!(engine.get("stable-key"), ("1".to_string(), true));
    }
}
