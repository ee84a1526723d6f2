//! Cache trait for document lists and derived period partitions.
//!
//! This module defines the [`FilingCache`] trait that provides a unified interface
//! for caching document-list lookups and the prior/current tables derived from
//! each filing.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::time::Duration;

use crate::{
    error::Result,
    period::Period,
    table::RawTable,
    types::{DocId, DocumentMeta},
};

/// Trait for caching fetched and derived filing data.
///
/// A cached partition holds nothing beyond the table's contents: reading it
/// back must be equivalent to splitting the original export again.
#[async_trait]
pub trait FilingCache: Send + Sync {
    /// Retrieves the cached document list for a submission date.
    ///
    /// Returns `Ok(Some(docs))` if cached, `Ok(None)` if not cached.
    async fn get_documents(&self, date: NaiveDate) -> Result<Option<Vec<DocumentMeta>>>;

    /// Stores the document list for a submission date.
    async fn put_documents(&self, date: NaiveDate, documents: &[DocumentMeta]) -> Result<()>;

    /// Searches every cached document list for an exact filer name.
    async fn find_documents_by_filer(&self, filer_name: &str) -> Result<Vec<DocumentMeta>>;

    /// Retrieves a cached period partition of a filing.
    ///
    /// Returns `Ok(Some(table))` if cached, `Ok(None)` if not cached.
    async fn get_partition(&self, doc_id: &DocId, period: Period) -> Result<Option<RawTable>>;

    /// Stores a period partition of a filing.
    async fn put_partition(&self, doc_id: &DocId, period: Period, table: &RawTable) -> Result<()>;

    /// Removes cache entries older than the specified TTL.
    ///
    /// Returns the number of entries invalidated.
    async fn invalidate_stale(&self, ttl: Duration) -> Result<usize>;

    /// Clears all cached data.
    async fn clear(&self) -> Result<()>;
}
