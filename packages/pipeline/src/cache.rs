//! In-memory memo of pipeline results with a time-to-live.
//!
//! Results are shared as `Arc<V>` so a hit never copies the tables. An
//! entry older than the TTL is treated as absent and recomputed on the next
//! request. A zero TTL disables memoization entirely.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Keyed memo of computed results with a fixed time-to-live.
pub struct TtlCache<K, V> {
    ttl: Duration,
    entries: Mutex<BTreeMap<K, (Instant, Arc<V>)>>,
}

impl<K: Ord + Clone, V> TtlCache<K, V> {
    /// Creates an empty cache whose entries live for `ttl`.
    #[must_use]
    pub const fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// Returns the live entry for `key`, if any.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.get_at(key, Instant::now())
    }

    fn get_at(&self, key: &K, now: Instant) -> Option<Arc<V>> {
        let mut entries = self.lock();
        let (stored_at, value) = entries.get(key)?;
        if now.saturating_duration_since(*stored_at) < self.ttl {
            return Some(Arc::clone(value));
        }
        entries.remove(key);
        None
    }

    /// Stores `value` under `key` and returns the shared handle. Expired
    /// entries under other keys are dropped at the same time.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        self.insert_at(key, value, Instant::now())
    }

    fn insert_at(&self, key: K, value: V, now: Instant) -> Arc<V> {
        let value = Arc::new(value);
        if !self.ttl.is_zero() {
            let mut entries = self.lock();
            entries.retain(|_, (stored_at, _)| {
                now.saturating_duration_since(*stored_at) < self.ttl
            });
            entries.insert(key, (now, Arc::clone(&value)));
        }
        value
    }

    /// Returns the live entry for `key` or computes, stores and returns a
    /// new one. Failed computations are not stored.
    ///
    /// The lock is not held while `compute` runs, so two concurrent misses
    /// on the same key may both compute; the later insert wins.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `compute`.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: &K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<Arc<V>, E> {
        if let Some(hit) = self.get(key) {
            log::debug!("Cache hit");
            return Ok(hit);
        }
        let value = compute()?;
        Ok(self.insert(key.clone(), value))
    }

    /// Number of stored entries. Expired entries count until the next
    /// insert.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is stored.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops every entry.
    ///
    /// # Panics
    ///
    /// Panics if the cache mutex is poisoned.
    pub fn flush(&self) {
        let mut entries = self.lock();
        log::info!("Flushing {} cached results", entries.len());
        entries.clear();
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<K, (Instant, Arc<V>)>> {
        self.entries.lock().expect("Result cache mutex poisoned")
    }
}
