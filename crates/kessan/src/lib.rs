#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Balance-sheet extraction and solvency ratios for EDINET filings.
//!
//! This crate re-exports the core types and stages, the cache backends and the
//! EDINET client, and provides a [`Pipeline`] that drives filings from a
//! [`FilingSource`] through splitting, extraction and aggregation.
//!
//! # Features
//!
//! - `edinet` - EDINET API v2 filing source
//! - `cache-sqlite` - SQLite-based caching
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kessan::{DocId, EdinetConfig, EdinetProvider, Pipeline, SqliteCache, report};
//!
//! #[tokio::main]
//! async fn main() -> kessan::Result<()> {
//!     let source = Arc::new(EdinetProvider::new(EdinetConfig::from_env()?)?);
//!     let pipeline = Pipeline::new(source).with_cache(Arc::new(SqliteCache::new("kessan.db")?));
//!
//!     let report = pipeline.run(&[DocId::new("S100ABCD")]).await;
//!     print!("{}", report::render_text(&report)?);
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use kessan_core::*;

// Cache implementations
#[cfg(feature = "cache-sqlite")]
pub use kessan_cache::SqliteCache;
pub use kessan_cache::{InMemoryCache, NoopCache};

// Filing sources
#[cfg(feature = "edinet")]
pub use kessan_edinet::{EdinetConfig, EdinetProvider, with_retry};

/// Pipeline orchestration.
pub mod pipeline;
/// Text and JSON rendering of pipeline reports.
pub mod report;

pub use pipeline::{
    FilingOutcome, Pipeline, PipelineConfig, PipelineReport, effective_date,
};
