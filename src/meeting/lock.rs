//! Per-key mutual exclusion for end-of-meeting requests.
//!
//! At most one operation per key is in flight at any time. A caller that
//! arrives while an operation for the same key is running does not start a
//! new one; it awaits the in-flight operation and receives its cloned
//! result. If the in-flight operation fails, waiters are not handed the
//! failure — each is allowed to start a fresh attempt. The table entry for
//! a key is removed when its operation settles, whatever the path, so the
//! key can be locked again later.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::debug;

#[derive(Clone)]
enum Settled<T: Clone> {
    Pending,
    Done(T),
    Failed,
}

type InflightTable<T> = Mutex<HashMap<String, watch::Receiver<Settled<T>>>>;

/// Keyed lock owned by the service instance. No FIFO guarantee across
/// waiters; the only guarantee is one active operation per key.
pub struct KeyedLock<T: Clone> {
    inflight: InflightTable<T>,
}

impl<T: Clone + Send + Sync + 'static> Default for KeyedLock<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> KeyedLock<T> {
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Number of keys currently in flight.
    pub fn inflight_len(&self) -> usize {
        lock_table(&self.inflight).len()
    }

    pub async fn with_lock<F, Fut>(&self, key: &str, operation: F) -> anyhow::Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send,
    {
        let settle_tx = loop {
            let existing = {
                let mut table = lock_table(&self.inflight);
                match table.get(key) {
                    Some(rx) => Some(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(Settled::Pending);
                        table.insert(key.to_owned(), rx);
                        break tx;
                    }
                }
            };

            if let Some(mut rx) = existing {
                debug!("Attaching to in-flight operation for key {}", key);
                loop {
                    {
                        match &*rx.borrow() {
                            Settled::Done(value) => return Ok(value.clone()),
                            Settled::Failed => break,
                            Settled::Pending => {}
                        }
                    }
                    if rx.changed().await.is_err() {
                        // Holder dropped without settling (panic or abort).
                        break;
                    }
                }
                // The in-flight attempt failed; start a fresh one.
            }
        };

        // Entry removal is tied to this guard so the key is freed on every
        // path, including an operation that panics.
        let _release = ReleaseGuard {
            key: key.to_owned(),
            table: &self.inflight,
        };

        let result = operation().await;
        drop(_release);
        match &result {
            Ok(value) => {
                let _ = settle_tx.send(Settled::Done(value.clone()));
            }
            Err(_) => {
                let _ = settle_tx.send(Settled::Failed);
            }
        }
        result
    }
}

fn lock_table<T: Clone>(
    table: &InflightTable<T>,
) -> MutexGuard<'_, HashMap<String, watch::Receiver<Settled<T>>>> {
    // A poisoned table only means some holder panicked; the map itself is
    // still consistent because every mutation is a single insert/remove.
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct ReleaseGuard<'a, T: Clone> {
    key: String,
    table: &'a InflightTable<T>,
}

impl<T: Clone> Drop for ReleaseGuard<'_, T> {
    fn drop(&mut self) {
        lock_table(self.table).remove(&self.key);
    }
}
