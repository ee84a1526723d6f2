//! Solvency ratios over summed balance-sheet snapshots.
//!
//! [`compute_ratios`] sums each field across the snapshots of one period and
//! derives:
//!
//! ```text
//! current ratio = current assets / current liabilities * 100   (>= 100 is healthy)
//! equity ratio  = net assets / total assets * 100              (>= 50 is healthy)
//! fixed ratio   = noncurrent assets / net assets * 100         (<= 100 is desirable)
//! ```
//!
//! A zero denominator makes only that ratio [`RatioUndefined`]; the others are
//! still computed.
//!
//! Sums are kept in `i128`, so any number of `i64` snapshots adds up exactly.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::KessanError;
use crate::types::{BalanceSheetSnapshot, ItemLabel};

/// The ratios derived from a balance sheet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatioKind {
    /// 流動比率: current assets over current liabilities.
    Current,
    /// 自己資本比率: net assets over total assets.
    Equity,
    /// 固定比率: noncurrent assets over net assets.
    Fixed,
}

impl RatioKind {
    /// All ratios in reporting order.
    pub const ALL: [Self; 3] = [Self::Current, Self::Equity, Self::Fixed];

    /// Japanese name of the ratio.
    #[must_use]
    pub const fn japanese_name(&self) -> &'static str {
        match self {
            Self::Current => "流動比率",
            Self::Equity => "自己資本比率",
            Self::Fixed => "固定比率",
        }
    }

    /// Returns true if `percent` falls in the conventionally healthy range.
    ///
    /// The fixed-ratio threshold is industry dependent.
    #[must_use]
    pub fn is_healthy(&self, percent: f64) -> bool {
        match self {
            Self::Current => percent >= 100.0,
            Self::Equity => percent >= 50.0,
            Self::Fixed => percent <= 100.0,
        }
    }

    /// Human-readable health criterion.
    #[must_use]
    pub const fn criterion(&self) -> &'static str {
        match self {
            Self::Current => ">= 100% is healthy",
            Self::Equity => ">= 50% is healthy",
            Self::Fixed => "<= 100% is desirable",
        }
    }
}

impl fmt::Display for RatioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Current => f.write_str("current ratio"),
            Self::Equity => f.write_str("equity ratio"),
            Self::Fixed => f.write_str("fixed ratio"),
        }
    }
}

/// A ratio whose denominator was zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatioUndefined {
    /// Which ratio.
    pub ratio: RatioKind,
}

impl fmt::Display for RatioUndefined {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is undefined", self.ratio)
    }
}

impl std::error::Error for RatioUndefined {}

impl From<RatioUndefined> for KessanError {
    fn from(e: RatioUndefined) -> Self {
        Self::RatioUndefined { ratio: e.ratio }
    }
}

/// Outcome of one ratio, as a percentage at full precision.
pub type RatioResult = std::result::Result<f64, RatioUndefined>;

/// Field-wise sums of several snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceSheetTotals {
    /// 流動資産
    pub current_assets: i128,
    /// 固定資産
    pub noncurrent_assets: i128,
    /// 流動負債
    pub current_liabilities: i128,
    /// 固定負債
    pub noncurrent_liabilities: i128,
    /// 純資産
    pub net_assets: i128,
}

impl BalanceSheetTotals {
    /// Returns the value of a field by label.
    #[must_use]
    pub const fn get(&self, label: ItemLabel) -> i128 {
        match label {
            ItemLabel::CurrentAssets => self.current_assets,
            ItemLabel::NoncurrentAssets => self.noncurrent_assets,
            ItemLabel::CurrentLiabilities => self.current_liabilities,
            ItemLabel::NoncurrentLiabilities => self.noncurrent_liabilities,
            ItemLabel::NetAssets => self.net_assets,
        }
    }

    /// Adds one snapshot to the sums.
    #[must_use]
    pub const fn add(self, s: &BalanceSheetSnapshot) -> Self {
        Self {
            current_assets: self.current_assets + s.current_assets as i128,
            noncurrent_assets: self.noncurrent_assets + s.noncurrent_assets as i128,
            current_liabilities: self.current_liabilities + s.current_liabilities as i128,
            noncurrent_liabilities: self.noncurrent_liabilities
                + s.noncurrent_liabilities as i128,
            net_assets: self.net_assets + s.net_assets as i128,
        }
    }

    /// Current plus noncurrent assets.
    #[must_use]
    pub const fn total_assets(&self) -> i128 {
        self.current_assets + self.noncurrent_assets
    }

    /// Current plus noncurrent liabilities.
    #[must_use]
    pub const fn total_liabilities(&self) -> i128 {
        self.current_liabilities + self.noncurrent_liabilities
    }
}

impl From<BalanceSheetSnapshot> for BalanceSheetTotals {
    fn from(snapshot: BalanceSheetSnapshot) -> Self {
        Self::default().add(&snapshot)
    }
}

/// Summed balance-sheet fields of one period plus the derived ratios.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateFinancials {
    /// Number of snapshots summed.
    pub filings: usize,
    /// Summed fields.
    pub totals: BalanceSheetTotals,
    /// Current plus noncurrent assets.
    pub total_assets: i128,
    /// Current plus noncurrent liabilities.
    pub total_liabilities: i128,
    /// Current ratio, in percent.
    pub current_ratio: RatioResult,
    /// Equity ratio, in percent.
    pub equity_ratio: RatioResult,
    /// Fixed ratio, in percent.
    pub fixed_ratio: RatioResult,
}

impl AggregateFinancials {
    /// Returns a ratio by kind.
    #[must_use]
    pub const fn ratio(&self, kind: RatioKind) -> RatioResult {
        match kind {
            RatioKind::Current => self.current_ratio,
            RatioKind::Equity => self.equity_ratio,
            RatioKind::Fixed => self.fixed_ratio,
        }
    }
}

/// Sums `snapshots` and computes the three ratios.
///
/// An empty slice yields all-zero sums (and therefore undefined ratios).
#[must_use]
pub fn compute_ratios(snapshots: &[BalanceSheetSnapshot]) -> AggregateFinancials {
    let totals = snapshots
        .iter()
        .fold(BalanceSheetTotals::default(), BalanceSheetTotals::add);

    let total_assets = totals.total_assets();
    let total_liabilities = totals.total_liabilities();

    AggregateFinancials {
        filings: snapshots.len(),
        totals,
        total_assets,
        total_liabilities,
        current_ratio: percent(
            RatioKind::Current,
            totals.current_assets,
            totals.current_liabilities,
        ),
        equity_ratio: percent(RatioKind::Equity, totals.net_assets, total_assets),
        fixed_ratio: percent(RatioKind::Fixed, totals.noncurrent_assets, totals.net_assets),
    }
}

fn percent(ratio: RatioKind, numerator: i128, denominator: i128) -> RatioResult {
    if denominator == 0 {
        return Err(RatioUndefined { ratio });
    }
    Ok(numerator as f64 / denominator as f64 * 100.0)
}

/// Rounds to two decimals for presentation.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
