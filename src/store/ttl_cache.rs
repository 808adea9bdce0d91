//! In-memory key-value cache with TTL-on-read eviction

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::domain::Clock;

/// Cache whose entries expire a fixed time after insertion
///
/// Expired entries are removed when read. An entry is still served at
/// exactly `ttl` after insertion and evicted one millisecond later.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, (u64, V)>>,
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: ttl.as_millis() as u64,
            clock,
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now_ms();
        let mut entries = self.lock();
        let fresh = match entries.get(key) {
            Some((stored_at, _)) => now.saturating_sub(*stored_at) <= self.ttl_ms,
            None => return None,
        };
        if fresh {
            entries.get(key).map(|(_, value)| value.clone())
        } else {
            entries.remove(key);
            None
        }
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now_ms();
        self.lock().insert(key, (now, value));
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Acquire the map, recovering from a poisoned lock
    fn lock(&self) -> MutexGuard<'_, HashMap<K, (u64, V)>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("ttl cache mutex was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
