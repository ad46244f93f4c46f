use super::watch::Watcher;
use super::Record;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// One shard of the engine: its own map and its own watcher table, each
/// behind an independent reader/writer lock.
pub struct Partition {
    data: RwLock<HashMap<String, Record>>,
    watchers: RwLock<HashMap<String, Arc<Watcher>>>,
}

impl Partition {
    pub fn new() -> Self {
        Partition {
            data: RwLock::new(HashMap::new()),
            watchers: RwLock::new(HashMap::new()),
        }
    }

    pub fn set(&self, key: &str, value: String, expires_at: u64) {
        self.data.write().insert(
            key.to_string(),
            Record {
                value: value.clone(),
                expires_at,
            },
        );
        if let Some(watcher) = self.watchers.read().get(key) {
            watcher.notify(value);
        }
    }

    pub fn get(&self, key: &str, now: u64) -> (String, bool) {
        {
            let data = self.data.read();
            match data.get(key) {
                Some(record) if !record.is_expired(now) => {
                    return (record.value.clone(), true)
                }
                Some(_) => {}
                None => return (String::new(), false),
            }
        }
        // Upgrade to writer intent to evict the expired record.
        self.data.write().remove(key);
        (String::new(), false)
    }

    pub fn del(&self, key: &str) {
        self.data.write().remove(key);
    }

    pub fn watch(&self, key: &str) -> Arc<Watcher> {
        let mut watchers = self.watchers.write();
        watchers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Watcher::new()))
            .clone()
    }

    pub fn sweep_expired(&self, now: u64, batch_size: usize) -> usize {
        let expired: Vec<String> = {
            let data = self.data.read();
            data.iter()
                .filter(|(_, r)| r.is_expired(now))
                .take(batch_size)
                .map(|(k, _)| k.clone())
                .collect()
        };
        if expired.is_empty() {
            return 0;
        }
        let mut data = self.data.write();
        for key in &expired {
            data.remove(key);
        }
        expired.len()
    }

    /// Drops watchers with no outstanding waiters, bounding memory growth.
    #[allow(dead_code)]
    pub fn reap_watchers(&self) {
        self.watchers.write().retain(|_, w| w.has_waiters());
    }
}
