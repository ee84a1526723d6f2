//! In-memory cache implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use kessan_core::{DocId, DocumentMeta, FilingCache, Period, RawTable, Result};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Cache entry with timestamp for TTL-based invalidation.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    data: T,
    cached_at: chrono::DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    fn is_stale(&self, ttl: Duration) -> bool {
        let age = Utc::now().signed_duration_since(self.cached_at);
        age > chrono::TimeDelta::from_std(ttl).unwrap_or(chrono::TimeDelta::MAX)
    }
}

/// Simple in-memory cache for testing and single runs.
///
/// Data is stored in `RwLock`-protected `HashMap`s and is lost when the cache
/// is dropped. Tables and document lists are cloned on get/put operations.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    documents: RwLock<HashMap<NaiveDate, CacheEntry<Vec<DocumentMeta>>>>,
    partitions: RwLock<HashMap<(DocId, Period), CacheEntry<RawTable>>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FilingCache for InMemoryCache {
    #[instrument(skip(self))]
    async fn get_documents(&self, date: NaiveDate) -> Result<Option<Vec<DocumentMeta>>> {
        let cache = self.documents.read().await;
        match cache.get(&date) {
            Some(entry) => {
                debug!("Cache hit for document list");
                Ok(Some(entry.data.clone()))
            }
            None => {
                debug!("Cache miss for document list");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn put_documents(&self, date: NaiveDate, documents: &[DocumentMeta]) -> Result<()> {
        let mut cache = self.documents.write().await;
        cache.insert(date, CacheEntry::new(documents.to_vec()));
        debug!("Cached document list");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_documents_by_filer(&self, filer_name: &str) -> Result<Vec<DocumentMeta>> {
        let cache = self.documents.read().await;
        let mut dates: Vec<_> = cache.keys().copied().collect();
        dates.sort_unstable();

        let found: Vec<_> = dates
            .iter()
            .filter_map(|date| cache.get(date))
            .flat_map(|entry| entry.data.iter())
            .filter(|doc| doc.is_filed_by(filer_name))
            .cloned()
            .collect();

        debug!("Found {} cached documents for filer", found.len());
        Ok(found)
    }

    #[instrument(skip(self), fields(doc_id = %doc_id))]
    async fn get_partition(&self, doc_id: &DocId, period: Period) -> Result<Option<RawTable>> {
        let cache = self.partitions.read().await;
        match cache.get(&(doc_id.clone(), period)) {
            Some(entry) => {
                debug!("Cache hit for partition");
                Ok(Some(entry.data.clone()))
            }
            None => {
                debug!("Cache miss for partition");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, table), fields(doc_id = %doc_id, rows = table.len()))]
    async fn put_partition(&self, doc_id: &DocId, period: Period, table: &RawTable) -> Result<()> {
        let mut cache = self.partitions.write().await;
        cache.insert((doc_id.clone(), period), CacheEntry::new(table.clone()));
        debug!("Cached partition");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let mut total_removed = 0usize;

        {
            let mut cache = self.documents.write().await;
            let before = cache.len();
            cache.retain(|_, entry| !entry.is_stale(ttl));
            total_removed += before - cache.len();
        }

        {
            let mut cache = self.partitions.write().await;
            let before = cache.len();
            cache.retain(|_, entry| !entry.is_stale(ttl));
            total_removed += before - cache.len();
        }

        if total_removed > 0 {
            debug!("Invalidated {} stale cache entries", total_removed);
        }

        Ok(total_removed)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        self.documents.write().await.clear();
        self.partitions.write().await.clear();
        debug!("Cleared all cache entries");
        Ok(())
    }
}
