use std::{num::NonZeroUsize, sync::Mutex};

use async_trait::async_trait;
use lru::LruCache;

use crate::application::repos::{CacheError, MathCache};
use crate::domain::entities::{CacheEntry, Fingerprint};
use crate::infra::lock::mutex_lock;

const SOURCE: &str = "infra::cache::memory";

/// Process-local LRU store of conversion results.
pub struct MemoryMathCache {
    entries: Mutex<LruCache<Fingerprint, CacheEntry>>,
}

impl MemoryMathCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MathCache for MemoryMathCache {
    async fn read(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>, CacheError> {
        Ok(mutex_lock(&self.entries, SOURCE, "read")
            .get(fingerprint)
            .cloned())
    }

    async fn write(&self, fingerprint: &Fingerprint, entry: &CacheEntry) -> Result<(), CacheError> {
        mutex_lock(&self.entries, SOURCE, "write").put(fingerprint.clone(), entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capacity(value: usize) -> NonZeroUsize {
        NonZeroUsize::new(value).expect("non-zero capacity")
    }

    #[tokio::test]
    async fn stores_and_returns_entries() {
        let cache = MemoryMathCache::new(capacity(4));
        let fingerprint = Fingerprint::compute("x", "");
        assert!(cache.read(&fingerprint).await.expect("read").is_none());

        let entry = CacheEntry::new("x", "<math/>", None);
        cache.write(&fingerprint, &entry).await.expect("write");

        assert_eq!(cache.read(&fingerprint).await.expect("read"), Some(entry));
    }

    #[tokio::test]
    async fn evicts_least_recently_used_entry() {
        let cache = MemoryMathCache::new(capacity(1));
        let first = Fingerprint::compute("a", "");
        let second = Fingerprint::compute("b", "");

        cache
            .write(&first, &CacheEntry::new("a", "<math/>", None))
            .await
            .expect("write");
        cache
            .write(&second, &CacheEntry::new("b", "<math/>", None))
            .await
            .expect("write");

        assert!(cache.read(&first).await.expect("read").is_none());
        assert!(cache.read(&second).await.expect("read").is_some());
        assert_eq!(cache.len(), 1);
    }
}
