//! Collaborator traits.
//!
//! This module defines the seams between the pure extraction core and the
//! outside world:
//!
//! - [`FilingSource`] - Retrieves document lists and filing exports
//! - [`NarrativeAnalyzer`] - Turns normalized figures into a written analysis

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt::Debug;

use crate::{
    error::Result,
    narrative::NarrativeRequest,
    retry::RetryPolicy,
    table::RawTable,
    types::{DocId, DocumentMeta},
};

/// Source of disclosure filings.
///
/// Implementations own all blocking I/O (network, retry, rate-limit waits);
/// a returned [`RawTable`] is fully decoded and ready for splitting.
#[async_trait]
pub trait FilingSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g., "EDINET").
    fn name(&self) -> &str;

    /// Lists the documents submitted on `date`.
    async fn list_documents(&self, date: NaiveDate) -> Result<Vec<DocumentMeta>>;

    /// Downloads a filing and decodes its tabular export.
    ///
    /// Failed attempts are retried according to `retry`.
    async fn fetch_archive(&self, doc_id: &DocId, retry: &RetryPolicy) -> Result<RawTable>;
}

/// Narrative/LLM collaborator.
///
/// Receives the normalized balance-sheet figures and returns prose.
#[async_trait]
pub trait NarrativeAnalyzer: Send + Sync + Debug {
    /// Returns the name of this analyzer.
    fn name(&self) -> &str;

    /// Produces an analysis for the request.
    async fn analyze(&self, request: &NarrativeRequest) -> Result<String>;
}
