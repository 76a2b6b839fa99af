//! Synchronization primitives for Ferme.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-key async mutex that forgets keys nobody is using.
///
/// Operations on different keys run concurrently, operations on the same key
/// are serialized. An entry is removed when the last guard for it is dropped
/// and nobody is waiting on it, so the map only holds keys that are in use.
///
/// ```ignore
/// let locks = KeyedLocks::new();
/// let _guard = locks.acquire("taches/01J...").await;
/// // read-modify-write the record
/// ```
#[derive(Clone, Default)]
pub struct KeyedLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    /// Create a new empty lock collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn acquire(&self, key: &str) -> KeyedGuard {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = lock.lock_owned().await;
        KeyedGuard {
            guard: Some(guard),
            key: key.to_string(),
            locks: Arc::clone(&self.locks),
        }
    }

    /// Number of keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Return true if no key is held or waited on.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl fmt::Debug for KeyedLocks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedLocks")
            .field("held", &self.locks.len())
            .finish()
    }
}

/// Exclusive access to one key of a [`KeyedLocks`].
pub struct KeyedGuard {
    guard: Option<OwnedMutexGuard<()>>,
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl Drop for KeyedGuard {
    fn drop(&mut self) {
        // Release the mutex first so its Arc no longer counts.
        drop(self.guard.take());
        // Only the map holds the lock now: nobody is waiting.
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
