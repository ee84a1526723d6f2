//! No-op cache implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use kessan_core::{DocId, DocumentMeta, FilingCache, Period, RawTable, Result};
use std::time::Duration;
use tracing::trace;

/// A no-op cache that doesn't store anything.
///
/// All `get_*` methods return `Ok(None)` and all `put_*` methods return `Ok(())`.
/// Every run against it fetches and splits each filing afresh.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCache;

impl NoopCache {
    /// Create a new no-op cache.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FilingCache for NoopCache {
    async fn get_documents(&self, _date: NaiveDate) -> Result<Option<Vec<DocumentMeta>>> {
        trace!("NoopCache: get_documents called, returning None");
        Ok(None)
    }

    async fn put_documents(&self, _date: NaiveDate, _documents: &[DocumentMeta]) -> Result<()> {
        trace!("NoopCache: put_documents called, doing nothing");
        Ok(())
    }

    async fn find_documents_by_filer(&self, _filer_name: &str) -> Result<Vec<DocumentMeta>> {
        trace!("NoopCache: find_documents_by_filer called, returning nothing");
        Ok(Vec::new())
    }

    async fn get_partition(&self, _doc_id: &DocId, _period: Period) -> Result<Option<RawTable>> {
        trace!("NoopCache: get_partition called, returning None");
        Ok(None)
    }

    async fn put_partition(
        &self,
        _doc_id: &DocId,
        _period: Period,
        _table: &RawTable,
    ) -> Result<()> {
        trace!("NoopCache: put_partition called, doing nothing");
        Ok(())
    }

    async fn invalidate_stale(&self, _ttl: Duration) -> Result<usize> {
        trace!("NoopCache: invalidate_stale called, returning 0");
        Ok(0)
    }

    async fn clear(&self) -> Result<()> {
        trace!("NoopCache: clear called, doing nothing");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_cache_forgets_everything() {
        let cache = NoopCache::new();
        let id = DocId::new("S100ABCD");
        let date = NaiveDate::from_ymd_opt(2024, 6, 25).unwrap();
        let docs = [DocumentMeta::new(id.clone(), "株式会社テスト")];

        assert!(cache.put_documents(date, &docs).await.is_ok());
        assert!(
            cache
                .put_partition(&id, Period::Current, &RawTable::default())
                .await
                .is_ok()
        );

        assert!(cache.get_documents(date).await.unwrap().is_none());
        assert!(
            cache
                .find_documents_by_filer("株式会社テスト")
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            cache
                .get_partition(&id, Period::Current)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_noop_cache_management() {
        let cache = NoopCache::new();

        let removed = cache
            .invalidate_stale(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        assert!(cache.clear().await.is_ok());
    }
}
