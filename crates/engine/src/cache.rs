//! Bounded TTL cache for generated examples.
//!
//! Eviction is FIFO by insertion order, not LRU: a hit does not refresh an entry's position.

use crate::clock::Clock;
use crate::render::GeneratedExample;
use crate::response_shape::ResponseShape;
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub example: Arc<GeneratedExample>,
    /// Shape of the success response the example was rendered against.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_shape: Option<ResponseShape>,
    pub created_at: DateTime<Utc>,
}

/// Cache key for one operation of one API.
#[must_use]
pub fn cache_key(api: &str, path: &str, method: &str) -> String {
    format!("{api}:{path}:{}", method.to_ascii_uppercase())
}

pub struct ExampleCache {
    capacity: usize,
    ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    entries: Mutex<IndexMap<String, Arc<CacheEntry>>>,
}

impl std::fmt::Debug for ExampleCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExampleCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl ExampleCache {
    /// `capacity` is clamped to at least 1.
    #[must_use]
    pub fn new(capacity: usize, ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            clock,
            entries: Mutex::new(IndexMap::new()),
        }
    }

    /// Return the fresh entry for `key`, or build, insert and return a new one.
    ///
    /// The lock is held while `build` runs, so concurrent callers for the same key build once.
    ///
    /// # Errors
    ///
    /// Propagates the builder's error; nothing is inserted in that case.
    pub fn get_or_build<E, F>(&self, key: &str, build: F) -> Result<Arc<CacheEntry>, E>
    where
        F: FnOnce() -> Result<(GeneratedExample, Option<ResponseShape>), E>,
    {
        let mut entries = self.entries.lock();
        let now = self.clock.now();

        if let Some(entry) = entries.get(key) {
            if now - entry.created_at < self.ttl {
                tracing::trace!(key, "example cache hit");
                return Ok(Arc::clone(entry));
            }
            tracing::debug!(key, "example cache entry expired");
            entries.shift_remove(key);
        }

        let (example, response_shape) = build()?;

        if entries.len() >= self.capacity
            && let Some((evicted, _)) = entries.shift_remove_index(0)
        {
            tracing::debug!(key = %evicted, "example cache full; evicted oldest entry");
        }

        let entry = Arc::new(CacheEntry {
            example: Arc::new(example),
            response_shape,
            created_at: now,
        });
        entries.insert(key.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Fresh entry for `key`, if any. Does not remove stale entries.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let now = self.clock.now();
        self.entries
            .lock()
            .get(key)
            .filter(|e| now - e.created_at < self.ttl)
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Keys in insertion (eviction) order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Drop every entry of `api`; returns how many were removed.
    pub fn invalidate_api(&self, api: &str) -> usize {
        let prefix = format!("{api}:");
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(&prefix));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
