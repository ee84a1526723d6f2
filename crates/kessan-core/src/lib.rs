#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/kessan/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types, traits and the balance-sheet extraction pipeline stages.
//!
//! The three pure stages are synchronous and own their inputs:
//!
//! - [`split`](split::split) - Partitions a filing export into prior and current periods
//! - [`extract`](extract::extract) - Locates the five balance-sheet aggregates in one period
//! - [`compute_ratios`](ratios::compute_ratios) - Sums snapshots and derives solvency ratios
//!
//! Around them sit the collaborator seams:
//!
//! - [`FilingSource`](provider::FilingSource) - Document lists and filing exports
//! - [`FilingCache`](cache::FilingCache) - Caching abstraction
//! - [`NarrativeAnalyzer`](provider::NarrativeAnalyzer) - Written analysis of the figures

/// Cache trait for document lists and derived partitions.
pub mod cache;
/// Error types for filing operations.
pub mod error;
/// Balance-sheet extraction.
pub mod extract;
/// Prompt construction for the narrative collaborator.
pub mod narrative;
/// Period and consolidation-scope definitions.
pub mod period;
/// Collaborator traits.
pub mod provider;
/// Solvency ratios.
pub mod ratios;
/// Retry policy for remote fetches.
pub mod retry;
/// Period splitting.
pub mod split;
/// Untyped tabular exports.
pub mod table;
/// Core data types (DocId, FilingRow, BalanceSheetSnapshot, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use cache::FilingCache;
pub use error::{KessanError, Result};
pub use extract::{Extraction, ScopeFallback, extract};
pub use narrative::NarrativeRequest;
pub use period::{ConsolidationScope, Period};
pub use provider::{FilingSource, NarrativeAnalyzer};
pub use ratios::{
    AggregateFinancials, BalanceSheetTotals, RatioKind, RatioResult, RatioUndefined,
    compute_ratios, round2,
};
pub use retry::RetryPolicy;
pub use split::{PeriodSplit, split};
pub use table::{CONTEXT_ID_COLUMN, RawTable};
pub use types::{
    BalanceSheetSnapshot, DocId, DocumentMeta, FactValue, FilingRow, ItemLabel, PeriodPartition,
    SnapshotRow, TagClass,
};
