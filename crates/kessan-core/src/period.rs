//! Reporting-period and consolidation-scope definitions.
//!
//! This module defines [`Period`] for the two temporal partitions of a filing
//! and [`ConsolidationScope`] for the two accounting conventions a row can be
//! reported under.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::KessanError;

/// Temporal partition of a filing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// The prior fiscal year.
    Prior,
    /// The fiscal year being reported.
    Current,
}

impl Period {
    /// Both periods, prior first.
    pub const ALL: [Self; 2] = [Self::Prior, Self::Current];

    /// Substring of a context id that marks a prior-period row.
    pub const PRIOR_MARKER: &'static str = "Prior";

    /// Returns the lowercase label used in artifact names and cache keys.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Prior => "prior",
            Self::Current => "current",
        }
    }

    /// Classifies a context id: anything containing "Prior" is prior, the rest current.
    #[must_use]
    pub fn of_context(context_id: &str) -> Self {
        if context_id.contains(Self::PRIOR_MARKER) {
            Self::Prior
        } else {
            Self::Current
        }
    }

    /// Context ids tried, in order, when locating the net-assets row.
    ///
    /// The non-consolidated member context comes first; the plain instant
    /// context is the fallback.
    #[must_use]
    pub const fn net_assets_contexts(&self) -> &'static [&'static str] {
        match self {
            Self::Prior => &[
                "Prior1YearInstant_NonConsolidatedMember",
                "Prior1YearInstant",
            ],
            Self::Current => &[
                "CurrentYearInstant_NonConsolidatedMember",
                "CurrentYearInstant",
            ],
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Period {
    type Err = KessanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prior" => Ok(Self::Prior),
            "current" => Ok(Self::Current),
            other => Err(KessanError::InvalidParameter(format!(
                "Unknown period: {other}"
            ))),
        }
    }
}

/// Accounting convention a row is reported under.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsolidationScope {
    /// Non-consolidated (parent company only) figures.
    #[default]
    Individual,
    /// Consolidated group figures.
    Consolidated,
}

impl ConsolidationScope {
    /// Returns the label used in the export's scope column.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Individual => "個別",
            Self::Consolidated => "連結",
        }
    }

    /// Returns the other scope.
    #[must_use]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Individual => Self::Consolidated,
            Self::Consolidated => Self::Individual,
        }
    }

    /// Parses a cell of the export's scope column.
    ///
    /// Values other than "個別" and "連結" (for example "その他") carry no
    /// scope and yield `None`.
    #[must_use]
    pub fn from_cell(cell: &str) -> Option<Self> {
        match cell.trim() {
            "個別" => Some(Self::Individual),
            "連結" => Some(Self::Consolidated),
            _ => None,
        }
    }
}

impl fmt::Display for ConsolidationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Individual => f.write_str("individual"),
            Self::Consolidated => f.write_str("consolidated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_of_context() {
        assert_eq!(Period::of_context("Prior1YearInstant"), Period::Prior);
        assert_eq!(
            Period::of_context("Prior2YearDuration_NonConsolidatedMember"),
            Period::Prior
        );
        assert_eq!(Period::of_context("CurrentYearInstant"), Period::Current);
        assert_eq!(Period::of_context("FilingDateInstant"), Period::Current);
        assert_eq!(Period::of_context(""), Period::Current);
        // case-sensitive
        assert_eq!(Period::of_context("prior1YearInstant"), Period::Current);
    }

    #[test]
    fn test_net_assets_contexts_order() {
        assert_eq!(
            Period::Current.net_assets_contexts()[0],
            "CurrentYearInstant_NonConsolidatedMember"
        );
        assert_eq!(Period::Prior.net_assets_contexts()[1], "Prior1YearInstant");
    }

    #[test]
    fn test_scope_from_cell() {
        assert_eq!(
            ConsolidationScope::from_cell("個別"),
            Some(ConsolidationScope::Individual)
        );
        assert_eq!(
            ConsolidationScope::from_cell(" 連結 "),
            Some(ConsolidationScope::Consolidated)
        );
        assert_eq!(ConsolidationScope::from_cell("その他"), None);
        assert_eq!(
            ConsolidationScope::Individual.opposite(),
            ConsolidationScope::Consolidated
        );
    }

    #[test]
    fn test_period_from_str() {
        assert_eq!("Prior".parse::<Period>().unwrap(), Period::Prior);
        assert!("next".parse::<Period>().is_err());
    }
}
