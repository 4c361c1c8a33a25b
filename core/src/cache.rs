//! Whole-response cache keyed by (query, mode, limit).
//!
//! Entries expire lazily: an expired entry is only noticed, and removed, by
//! the next read of its key. Capacity is bounded with LRU eviction.

use crate::error::CacheError;
use crate::retrieval::Mode;
use crate::types::RetrievalHit;
use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub mode: Mode,
    pub limit: usize,
}

impl CacheKey {
    pub fn new(query: &str, mode: Mode, limit: usize) -> Self {
        Self { query: query.trim().to_string(), mode, limit }
    }
}

pub type CachedHits = Arc<Vec<RetrievalHit>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_items: usize,
    pub expired_items: usize,
    pub active_items: usize,
}

/// Shared result store. Implementations must tolerate concurrent callers;
/// two requests racing on the same key may both compute and both `set`.
pub trait ResultCache: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedHits>, CacheError>;
    fn set(&self, key: CacheKey, value: CachedHits, ttl: Duration) -> Result<(), CacheError>;
    fn remove(&self, key: &CacheKey) -> Result<(), CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
    fn stats(&self) -> Result<CacheStats, CacheError>;
}

struct Entry {
    value: CachedHits,
    expires_at: Instant,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool { now >= self.expires_at }
}

pub struct TtlCache {
    entries: Mutex<LruCache<CacheKey, Entry>>,
    default_ttl: Duration,
}

impl TtlCache {
    pub fn new(capacity: NonZeroUsize, default_ttl: Duration) -> Self {
        tracing::info!(capacity = capacity.get(), ttl_secs = default_ttl.as_secs(), "result cache initialized");
        Self { entries: Mutex::new(LruCache::new(capacity)), default_ttl }
    }

    pub fn default_ttl(&self) -> Duration { self.default_ttl }

    pub fn len(&self) -> usize { self.entries.lock().len() }

    pub fn is_empty(&self) -> bool { self.entries.lock().is_empty() }
}

impl ResultCache for TtlCache {
    fn get(&self, key: &CacheKey) -> Result<Option<CachedHits>, CacheError> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if !entry.expired(now) => return Ok(Some(Arc::clone(&entry.value))),
            Some(_) => {}
            None => return Ok(None),
        }
        entries.pop(key);
        Ok(None)
    }

    fn set(&self, key: CacheKey, value: CachedHits, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = Instant::now() + ttl;
        self.entries.lock().put(key, Entry { value, expires_at });
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.entries.lock().pop(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.entries.lock().clear();
        Ok(())
    }

    fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = self.entries.lock();
        let now = Instant::now();
        let total_items = entries.len();
        let expired_items = entries.iter().filter(|(_, e)| e.expired(now)).count();
        Ok(CacheStats { total_items, expired_items, active_items: total_items - expired_items })
    }
}
