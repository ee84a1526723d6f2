//! Error types for filing retrieval and balance-sheet extraction.
//!
//! This module defines [`KessanError`] which covers every failure that can occur
//! while fetching a filing, splitting it by period, extracting balance-sheet
//! aggregates, computing ratios, or caching derived artifacts.

use thiserror::Error;

use crate::period::{ConsolidationScope, Period};
use crate::ratios::RatioKind;
use crate::types::ItemLabel;

/// Errors that can occur while processing a filing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KessanError {
    /// An expected column is absent from a tabular export.
    #[error("Schema error: column {column:?} not found")]
    Schema {
        /// Name of the missing column.
        column: String,
    },

    /// Neither individual nor consolidated rows are present in a partition.
    #[error("No {requested} or {fallback} rows in {period} period")]
    ScopeNotFound {
        /// Period of the partition that was searched.
        period: Period,
        /// Scope that was asked for.
        requested: ConsolidationScope,
        /// Scope that was tried after the requested one.
        fallback: ConsolidationScope,
    },

    /// A required label (and context, for net assets) is absent after all fallbacks.
    #[error("Field not found: {label} in {period} period")]
    FieldNotFound {
        /// The label that could not be located.
        label: ItemLabel,
        /// Period of the partition that was searched.
        period: Period,
    },

    /// The matched row's value cannot be coerced to an integer.
    #[error("Value for {label} is not an integer: {raw:?}")]
    ValueParse {
        /// The label whose row was matched.
        label: ItemLabel,
        /// Raw cell contents (empty when the cell was missing).
        raw: String,
    },

    /// A ratio's denominator is zero.
    #[error("{ratio} is undefined: zero denominator")]
    RatioUndefined {
        /// The ratio that could not be computed.
        ratio: RatioKind,
    },

    /// Network-related errors (connection failures, timeouts, HTTP status).
    #[error("Network error: {0}")]
    Network(String),

    /// Rate limit exceeded by the disclosure API.
    #[error("Rate limited: retry after {retry_after:?}")]
    RateLimited {
        /// Suggested time to wait before retrying.
        retry_after: Option<std::time::Duration>,
    },

    /// No document matched a filer name or id.
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// A downloaded archive is unreadable or holds no usable member.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Error parsing data from the disclosure API or a tabular export.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Error interacting with the cache.
    #[error("Cache error: {0}")]
    Cache(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl KessanError {
    /// Returns true for errors worth retrying against a remote source.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited { .. })
    }
}

/// Result type alias using [`KessanError`].
pub type Result<T> = std::result::Result<T, KessanError>;
