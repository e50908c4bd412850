//! Per-key async mutexes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex as SyncMutex, Weak};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per key, so that operations on the same book
/// run one at a time while different books proceed in parallel.
///
/// The map only holds weak references: a key's mutex lives exactly as long
/// as someone holds or waits on it, and dead entries are pruned as new keys
/// are locked.
#[derive(Debug)]
pub(crate) struct KeyedLocks<K> {
    locks: SyncMutex<HashMap<K, Weak<Mutex<()>>>>,
}

impl<K> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self { locks: SyncMutex::new(HashMap::new()) }
    }
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    /// Wait for exclusive access to `key`.
    ///
    /// Access is released when the returned guard is dropped.
    pub(crate) async fn lock(&self, key: &K) -> OwnedMutexGuard<()> {
        let mutex = self.mutex_for(key);
        mutex.lock_owned().await
    }

    fn mutex_for(&self, key: &K) -> Arc<Mutex<()>> {
        // A poisoned map only means another thread panicked mid-insert; the
        // map itself is still usable.
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(mutex) = locks.get(key).and_then(Weak::upgrade) {
            return mutex;
        }
        locks.retain(|_, weak| weak.strong_count() > 0);
        let mutex = Arc::new(Mutex::new(()));
        locks.insert(key.clone(), Arc::downgrade(&mutex));
        mutex
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::<u32>::default());
        let active = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let (locks, active) = (locks.clone(), active.clone());
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&1).await;
                assert_eq!(active.fetch_add(1, Ordering::SeqCst), 0, "two holders of one key");
                tokio::time::sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::<u32>::default();
        let _one = locks.lock(&1).await;
        // Would deadlock if keys shared a mutex.
        let _two = tokio::time::timeout(Duration::from_secs(1), locks.lock(&2)).await.unwrap();
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = KeyedLocks::<u32>::default();
        for key in 0..10 {
            drop(locks.lock(&key).await);
        }
        assert_eq!(locks.len(), 1, "only the most recent dead entry may linger");
    }
}
