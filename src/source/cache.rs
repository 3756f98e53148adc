//! Rendered PDF cache

use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;

/// A rendered PDF kept for later retrieval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPdf {
    pub filename: String,
    pub data: Vec<u8>,
}

impl CachedPdf {
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

struct CacheInner {
    lru: LruCache<String, CachedPdf>,
    total_bytes: usize,
}

/// LRU cache of rendered PDFs bounded by entry count and total bytes
pub struct ArtifactCache {
    inner: Mutex<CacheInner>,
    max_bytes: usize,
}

impl ArtifactCache {
    pub fn new(capacity: usize, max_bytes: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                lru: LruCache::new(capacity),
                total_bytes: 0,
            }),
            max_bytes,
        }
    }

    /// Store a PDF under a fresh key and return the key, or `None` when the
    /// PDF alone exceeds the byte budget.
    pub fn insert(&self, pdf: CachedPdf) -> Option<String> {
        let size = pdf.size();
        if size > self.max_bytes {
            tracing::debug!(size, max_bytes = self.max_bytes, "PDF too large to cache");
            return None;
        }

        let mut inner = self.inner.lock();

        let key = loop {
            let key = uuid::Uuid::new_v4().to_string();
            if !inner.lru.contains(&key) {
                break key;
            }
        };

        while inner.total_bytes + size > self.max_bytes {
            match inner.lru.pop_lru() {
                Some((_, evicted)) => {
                    inner.total_bytes = inner.total_bytes.saturating_sub(evicted.size());
                }
                None => break,
            }
        }

        // A full LRU evicts on push; account for it
        if let Some((_, evicted)) = inner.lru.push(key.clone(), pdf) {
            inner.total_bytes = inner.total_bytes.saturating_sub(evicted.size());
        }
        inner.total_bytes += size;
        Some(key)
    }

    pub fn get(&self, key: &str) -> Option<CachedPdf> {
        self.inner.lock().lru.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.lock().lru.contains(key)
    }

    pub fn remove(&self, key: &str) -> Option<CachedPdf> {
        let mut inner = self.inner.lock();
        let removed = inner.lru.pop(key)?;
        inner.total_bytes = inner.total_bytes.saturating_sub(removed.size());
        Some(removed)
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.lru.clear();
        inner.total_bytes = 0;
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.inner.lock().total_bytes
    }
}
