//! Keyed debounce scheduler.
//!
//! Each key holds at most one pending value. Scheduling again replaces the
//! value and supersedes the earlier timer; a timer only fires if its
//! generation is still the current one for the key when it wakes.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Abstraction for spawning work on a runtime.
pub trait Spawn {
    /// Spawn an async task that returns a future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

struct Pending<V> {
    generation: u64,
    value: V,
}

/// Map from key to a cancellable delayed task.
pub struct DebounceScheduler<K, V, S> {
    pending: Arc<Mutex<HashMap<K, Pending<V>>>>,
    next_generation: Arc<AtomicU64>,
    spawner: S,
}

impl<K, V, S: Clone> Clone for DebounceScheduler<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            pending: Arc::clone(&self.pending),
            next_generation: Arc::clone(&self.next_generation),
            spawner: self.spawner.clone(),
        }
    }
}

impl<K, V, S> DebounceScheduler<K, V, S>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Send + 'static,
    S: Spawn,
{
    /// Scheduler spawning timers through `spawner`.
    pub fn new(spawner: S) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(0)),
            spawner,
        }
    }

    /// Hold `value` for `key` and run `on_fire` with it after `delay`,
    /// unless it is replaced, taken or cancelled first.
    ///
    /// Returns true if a pending value was replaced.
    pub fn schedule<F, Fut>(&self, key: K, value: V, delay: Duration, on_fire: F) -> bool
    where
        F: FnOnce(K, V) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let replaced = self
            .pending
            .lock()
            .insert(key.clone(), Pending { generation, value })
            .is_some();

        let pending = Arc::clone(&self.pending);
        self.spawner.spawn(async move {
            tokio::time::sleep(delay).await;
            let fired = {
                let mut map = pending.lock();
                if map.get(&key).is_some_and(|p| p.generation == generation) {
                    map.remove(&key).map(|p| p.value)
                } else {
                    None
                }
            };
            if let Some(value) = fired {
                on_fire(key, value).await;
            }
        });
        replaced
    }

    /// Remove and return the pending value; its timer becomes a no-op.
    pub fn take(&self, key: &K) -> Option<V> {
        self.pending.lock().remove(key).map(|p| p.value)
    }

    /// Drop the pending value. Returns whether one existed.
    pub fn cancel(&self, key: &K) -> bool {
        self.take(key).is_some()
    }

    /// Remove and return every pending value.
    pub fn drain(&self) -> Vec<(K, V)> {
        self.pending
            .lock()
            .drain()
            .map(|(k, p)| (k, p.value))
            .collect()
    }

    /// Whether a value is pending for `key`.
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending.lock().contains_key(key)
    }

    /// Number of pending keys.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }
}
