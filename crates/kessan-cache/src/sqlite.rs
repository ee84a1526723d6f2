//! SQLite-based cache implementation.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use kessan_core::{DocId, DocumentMeta, FilingCache, KessanError, Period, RawTable, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, instrument};

/// SQLite-based cache for document lists and derived partitions.
///
/// This cache stores data in a SQLite database file, providing persistence across
/// runs. Partitions are stored as comma-separated text, the same artifact a
/// later run would derive by splitting the filing again.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Create a new SQLite cache at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| KessanError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory SQLite cache.
    ///
    /// Useful for testing; data is lost when the cache is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| KessanError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        // One row per fetched date, so an empty list is still a cache hit
        conn.execute(
            "CREATE TABLE IF NOT EXISTS document_lists (
                date TEXT PRIMARY KEY,
                count INTEGER NOT NULL,
                cached_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| KessanError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents_cache (
                date TEXT NOT NULL,
                seq INTEGER NOT NULL,
                doc_id TEXT NOT NULL,
                filer_name TEXT,
                data_json TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (date, seq)
            )",
            [],
        )
        .map_err(|e| KessanError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_filer
             ON documents_cache(filer_name)",
            [],
        )
        .map_err(|e| KessanError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS partitions_cache (
                doc_id TEXT NOT NULL,
                period TEXT NOT NULL,
                csv TEXT NOT NULL,
                cached_at TEXT NOT NULL,
                PRIMARY KEY (doc_id, period)
            )",
            [],
        )
        .map_err(|e| KessanError::Cache(e.to_string()))?;

        debug!("SQLite cache schema initialized");
        Ok(())
    }

    fn decode_documents<I>(rows: I) -> Result<Vec<DocumentMeta>>
    where
        I: Iterator<Item = rusqlite::Result<String>>,
    {
        let mut documents = Vec::new();
        for row in rows {
            let json = row.map_err(|e| KessanError::Cache(e.to_string()))?;
            let doc: DocumentMeta =
                serde_json::from_str(&json).map_err(|e| KessanError::Parse(e.to_string()))?;
            documents.push(doc);
        }
        Ok(documents)
    }
}

#[async_trait]
impl FilingCache for SqliteCache {
    #[instrument(skip(self))]
    async fn get_documents(&self, date: NaiveDate) -> Result<Option<Vec<DocumentMeta>>> {
        let date_str = date.to_string();

        let conn = self
            .conn
            .lock()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        let listed = conn
            .query_row(
                "SELECT count FROM document_lists WHERE date = ?1",
                params![date_str],
                |row| row.get::<_, i64>(0),
            )
            .optional()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        if listed.is_none() {
            debug!("No cached document list found");
            return Ok(None);
        }

        let mut stmt = conn
            .prepare(
                "SELECT data_json FROM documents_cache
                 WHERE date = ?1
                 ORDER BY seq ASC",
            )
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        let rows = stmt
            .query_map(params![date_str], |row| row.get::<_, String>(0))
            .map_err(|e| KessanError::Cache(e.to_string()))?;
        let documents = Self::decode_documents(rows)?;

        debug!("Found {} cached documents", documents.len());
        Ok(Some(documents))
    }

    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn put_documents(&self, date: NaiveDate, documents: &[DocumentMeta]) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let date_str = date.to_string();

        let conn = self
            .conn
            .lock()
            .map_err(|e| KessanError::Cache(e.to_string()))?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        tx.execute(
            "DELETE FROM documents_cache WHERE date = ?1",
            params![date_str],
        )
        .map_err(|e| KessanError::Cache(e.to_string()))?;

        for (seq, doc) in documents.iter().enumerate() {
            let data_json =
                serde_json::to_string(doc).map_err(|e| KessanError::Parse(e.to_string()))?;
            tx.execute(
                "INSERT INTO documents_cache
                 (date, seq, doc_id, filer_name, data_json, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    date_str,
                    seq as i64,
                    doc.doc_id.as_str(),
                    doc.filer_name,
                    data_json,
                    cached_at
                ],
            )
            .map_err(|e| KessanError::Cache(e.to_string()))?;
        }

        tx.execute(
            "INSERT OR REPLACE INTO document_lists (date, count, cached_at)
             VALUES (?1, ?2, ?3)",
            params![date_str, documents.len() as i64, cached_at],
        )
        .map_err(|e| KessanError::Cache(e.to_string()))?;

        tx.commit().map_err(|e| KessanError::Cache(e.to_string()))?;
        debug!("Cached {} documents", documents.len());
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_documents_by_filer(&self, filer_name: &str) -> Result<Vec<DocumentMeta>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT data_json FROM documents_cache
                 WHERE filer_name = ?1
                 ORDER BY date ASC, seq ASC",
            )
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        let rows = stmt
            .query_map(params![filer_name], |row| row.get::<_, String>(0))
            .map_err(|e| KessanError::Cache(e.to_string()))?;
        let documents = Self::decode_documents(rows)?;

        debug!("Found {} cached documents for filer", documents.len());
        Ok(documents)
    }

    #[instrument(skip(self), fields(doc_id = %doc_id))]
    async fn get_partition(&self, doc_id: &DocId, period: Period) -> Result<Option<RawTable>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        let result = conn
            .query_row(
                "SELECT csv FROM partitions_cache WHERE doc_id = ?1 AND period = ?2",
                params![doc_id.as_str(), period.label()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        match result {
            Some(csv) => {
                let table = RawTable::from_csv(&csv)?;
                debug!("Found cached partition with {} rows", table.len());
                Ok(Some(table))
            }
            None => {
                debug!("No cached partition found");
                Ok(None)
            }
        }
    }

    #[instrument(skip(self, table), fields(doc_id = %doc_id, rows = table.len()))]
    async fn put_partition(&self, doc_id: &DocId, period: Period, table: &RawTable) -> Result<()> {
        let cached_at = Utc::now().to_rfc3339();
        let csv = table.to_csv()?;

        let conn = self
            .conn
            .lock()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO partitions_cache
             (doc_id, period, csv, cached_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![doc_id.as_str(), period.label(), csv, cached_at],
        )
        .map_err(|e| KessanError::Cache(e.to_string()))?;

        debug!("Cached partition");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(ttl)
                .map_err(|e| KessanError::Cache(format!("Invalid TTL duration: {}", e)))?;
        let cutoff_str = cutoff.to_rfc3339();

        let conn = self
            .conn
            .lock()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        let mut total_deleted = 0usize;

        total_deleted += conn
            .execute(
                "DELETE FROM document_lists WHERE cached_at < ?1",
                params![cutoff_str],
            )
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        conn.execute(
            "DELETE FROM documents_cache
             WHERE date NOT IN (SELECT date FROM document_lists)",
            [],
        )
        .map_err(|e| KessanError::Cache(e.to_string()))?;

        total_deleted += conn
            .execute(
                "DELETE FROM partitions_cache WHERE cached_at < ?1",
                params![cutoff_str],
            )
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        if total_deleted > 0 {
            debug!("Invalidated {} stale cache entries", total_deleted);
        }

        Ok(total_deleted)
    }

    #[instrument(skip(self))]
    async fn clear(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        conn.execute("DELETE FROM document_lists", [])
            .map_err(|e| KessanError::Cache(e.to_string()))?;
        conn.execute("DELETE FROM documents_cache", [])
            .map_err(|e| KessanError::Cache(e.to_string()))?;
        conn.execute("DELETE FROM partitions_cache", [])
            .map_err(|e| KessanError::Cache(e.to_string()))?;

        debug!("Cleared all cache entries");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn partition() -> RawTable {
        RawTable::new(
            vec![
                "要素ID".to_string(),
                "項目名".to_string(),
                "コンテキストID".to_string(),
                "連結・個別".to_string(),
                "値".to_string(),
            ],
            vec![
                vec![
                    "jppfs_cor:CurrentAssets".to_string(),
                    "流動資産".to_string(),
                    "CurrentYearInstant".to_string(),
                    "個別".to_string(),
                    "1,000".to_string(),
                ],
                vec![
                    "jppfs_cor:NetAssets".to_string(),
                    "純資産".to_string(),
                    "CurrentYearInstant_NonConsolidatedMember".to_string(),
                    "個別".to_string(),
                    String::new(),
                ],
            ],
        )
    }

    #[tokio::test]
    async fn test_sqlite_cache_initialization() {
        let cache = SqliteCache::in_memory();
        assert!(cache.is_ok());
    }

    #[tokio::test]
    async fn test_documents_cache() {
        let cache = SqliteCache::in_memory().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 25).unwrap();

        assert!(cache.get_documents(date).await.unwrap().is_none());

        let mut annual = DocumentMeta::new(DocId::new("S100AAAA"), "株式会社テスト");
        annual.doc_type_code = Some("120".to_string());
        annual.period_end = NaiveDate::from_ymd_opt(2024, 3, 31);
        let docs = vec![
            annual,
            DocumentMeta::new(DocId::new("S100BBBB"), "別会社"),
            DocumentMeta::new(DocId::new("S100CCCC"), "株式会社テスト"),
        ];
        cache.put_documents(date, &docs).await.unwrap();

        assert_eq!(cache.get_documents(date).await.unwrap(), Some(docs));

        let found = cache.find_documents_by_filer("株式会社テスト").await.unwrap();
        let ids: Vec<_> = found.iter().map(|d| d.doc_id.as_str()).collect();
        assert_eq!(ids, vec!["S100AAAA", "S100CCCC"]);
    }

    #[tokio::test]
    async fn test_empty_document_list_is_cached() {
        let cache = SqliteCache::in_memory().unwrap();
        let holiday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        cache.put_documents(holiday, &[]).await.unwrap();
        assert_eq!(cache.get_documents(holiday).await.unwrap(), Some(vec![]));
    }

    #[tokio::test]
    async fn test_partition_cache() {
        let cache = SqliteCache::in_memory().unwrap();
        let id = DocId::new("S100ABCD");

        assert!(
            cache
                .get_partition(&id, Period::Prior)
                .await
                .unwrap()
                .is_none()
        );

        cache
            .put_partition(&id, Period::Prior, &partition())
            .await
            .unwrap();

        assert_eq!(
            cache.get_partition(&id, Period::Prior).await.unwrap(),
            Some(partition())
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
    async fn test_cache_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kessan.db");
        let id = DocId::new("S100ABCD");
        let date = NaiveDate::from_ymd_opt(2024, 6, 25).unwrap();

        {
            let cache = SqliteCache::new(&path).unwrap();
            cache
                .put_partition(&id, Period::Current, &partition())
                .await
                .unwrap();
            cache
                .put_documents(date, &[DocumentMeta::new(id.clone(), "株式会社テスト")])
                .await
                .unwrap();
        }

        let cache = SqliteCache::new(&path).unwrap();
        assert_eq!(
            cache.get_partition(&id, Period::Current).await.unwrap(),
            Some(partition())
        );
        assert_eq!(
            cache
                .find_documents_by_filer("株式会社テスト")
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache = SqliteCache::in_memory().unwrap();
        let id = DocId::new("S100ABCD");
        let date = NaiveDate::from_ymd_opt(2024, 6, 25).unwrap();

        cache
            .put_partition(&id, Period::Current, &partition())
            .await
            .unwrap();
        cache
            .put_documents(date, &[DocumentMeta::new(id.clone(), "株式会社テスト")])
            .await
            .unwrap();

        let removed = cache
            .invalidate_stale(Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(removed, 0);

        cache.clear().await.unwrap();
        assert!(cache.get_documents(date).await.unwrap().is_none());
        assert!(
            cache
                .get_partition(&id, Period::Current)
                .await
                .unwrap()
                .is_none()
        );
        assert!(
            cache
                .find_documents_by_filer("株式会社テスト")
                .await
                .unwrap()
                .is_empty()
        );
    }
}
