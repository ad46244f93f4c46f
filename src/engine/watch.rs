use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Notify;

/// A per-key change notifier. Holds the last value written to the key and
/// wakes every waiter when a new value arrives.
pub struct Watcher {
    current: Mutex<String>,
    notify: Notify,
    waiters: AtomicUsize,
}

impl Watcher {
    pub fn new() -> Self {
        Watcher {
            current: Mutex::new(String::new()),
            notify: Notify::new(),
            waiters: AtomicUsize::new(0),
        }
    }

    pub fn notify(&self, value: String) {
        *self.current.lock() = value;
        self.notify.notify_waiters();
    }

    pub fn has_waiters(&self) -> bool {
        self.waiters.load(Ordering::Acquire) > 0
    }

    /// Waits for the next value written after this call started observing.
    /// Returns the current value immediately if `cancel` resolves first.
    pub async fn wait_for_next(&self, cancel: impl std::future::Future<Output = ()>) -> String {
        let observed_at_registration = self.current.lock().clone();
        self.waiters.fetch_add(1, Ordering::AcqRel);
        let result = {
            tokio::pin!(cancel);
            loop {
                let notified = self.notify.notified();
                tokio::select! {
                    _ = notified => {
                        let now = self.current.lock().clone();
                        if now != observed_at_registration {
                            break now;
                        }
                    }
                    _ = &mut cancel => {
                        break self.current.lock().clone();
                    }
                }
            }
        };
        self.waiters.fetch_sub(1, Ordering::AcqRel);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn waiter_wakes_on_write() {
        let watcher = Arc::new(Watcher::new());
        let w = watcher.clone();
        let handle = tokio::spawn(async move {
            w.wait_for_next(std::future::pending()).await
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        watcher.notify("v1".to_string());
        let got = handle.await.unwrap();
        assert_eq!(got, "v1");
    }

    #[tokio::test]
    async fn cancellation_returns_current_value() {
        let watcher = Arc::new(Watcher::new());
        watcher.notify("seed".to_string());
        let got = watcher
            .wait_for_next(async { tokio::time::sleep(Duration::from_millis(5)).await })
            .await;
        assert_eq!(got, "seed");
    }
}
