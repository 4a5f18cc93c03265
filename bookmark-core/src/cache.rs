//! Size-bounded memoization for render results.
//!
//! Entries are evicted strictly in insertion order (FIFO). A lookup does not
//! refresh an entry's position. The tracked size never exceeds the budget:
//! a value larger than the whole budget is returned but not stored.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

/// Separator between key components; not expected in any path or argument
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Fixed per-entry overhead added to the size estimate
pub const ENTRY_OVERHEAD: usize = 64;

/// Join already-stringified key components
pub fn cache_key<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut key = String::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(part.as_ref());
    }
    key
}

/// Approximate memory cost of an entry: two bytes per character of the key
/// and of the serialized value, plus a fixed overhead
pub fn entry_size<V: Serialize + ?Sized>(key: &str, value: &V) -> usize {
    let serialized = serde_json::to_string(value)
        .map(|s| s.chars().count())
        .unwrap_or(0);
    key.chars().count() * 2 + serialized * 2 + ENTRY_OVERHEAD
}

/// Statistics about cache usage
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub size_bytes: usize,
}

struct CacheState<V> {
    entries: HashMap<String, (V, usize)>,
    order: VecDeque<String>,
    size_bytes: usize,
}

impl<V> CacheState<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            size_bytes: 0,
        }
    }

    fn evict_oldest(&mut self) -> bool {
        let Some(key) = self.order.pop_front() else {
            return false;
        };
        if let Some((_, size)) = self.entries.remove(&key) {
            self.size_bytes -= size;
            tracing::debug!(key = %key, size, "Evicted render cache entry");
        }
        true
    }
}

/// Bounded FIFO cache shared between concurrent renders.
///
/// Every insert/evict happens under one lock; the lock is never held across
/// an await, so two concurrent misses on the same key may both compute.
/// Only the first result is stored.
pub struct RenderCache<V> {
    state: Mutex<CacheState<V>>,
    budget_bytes: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<V: Clone + Serialize> RenderCache<V> {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            state: Mutex::new(CacheState::new()),
            budget_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let state = self.state.lock();
        match state.entries.get(key) {
            Some((value, _)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value, evicting the oldest entries until it fits.
    ///
    /// Returns `false` when the key was already present or the value alone
    /// exceeds the budget.
    pub fn insert(&self, key: String, value: V) -> bool {
        let size = entry_size(&key, &value);
        if size > self.budget_bytes {
            tracing::debug!(key = %key, size, "Value exceeds render cache budget; not cached");
            return false;
        }

        let mut state = self.state.lock();
        if state.entries.contains_key(&key) {
            return false;
        }
        while state.size_bytes + size > self.budget_bytes && state.evict_oldest() {}

        state.size_bytes += size;
        state.order.push_back(key.clone());
        state.entries.insert(key, (value, size));
        true
    }

    /// Memoize a fallible asynchronous computation.
    ///
    /// Only `Ok` results are stored, and the stored value is the eventual
    /// result, never a placeholder. Errors are returned to every caller that
    /// misses.
    pub async fn try_get_or_insert_with<F, Fut, E>(&self, key: String, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            tracing::trace!(key = %key, "Render cache hit");
            return Ok(value);
        }
        let value = compute().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.state.lock().size_bytes
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
        state.size_bytes = 0;
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: state.entries.len(),
            size_bytes: state.size_bytes,
        }
    }
}
