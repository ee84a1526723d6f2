//! Balance-sheet extraction from a period partition.
//!
//! [`extract`] locates the five balance-sheet aggregates in a
//! [`PeriodPartition`]:
//!
//! 1. Rows are filtered to the preferred [`ConsolidationScope`]; when none
//!    exist the opposite scope is used and a [`ScopeFallback`] is reported.
//! 2. The scoped rows are narrowed to the assets or liabilities tag class.
//! 3. Each label takes the first row whose item name matches exactly.
//! 4. Net assets additionally requires a period-specific context id, tried in
//!    the order given by [`Period::net_assets_contexts`].
//!
//! A label that cannot be located is a [`KessanError::FieldNotFound`]; it is
//! never replaced by zero.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{KessanError, Result};
use crate::period::{ConsolidationScope, Period};
use crate::types::{BalanceSheetSnapshot, FilingRow, ItemLabel, PeriodPartition, TagClass};

/// Notice that the preferred scope had no rows and the opposite one was used.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFallback {
    /// Scope that was asked for.
    pub requested: ConsolidationScope,
    /// Scope that was actually used.
    pub used: ConsolidationScope,
}

/// Result of extracting one partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    /// The period the snapshot describes.
    pub period: Period,
    /// The scope whose rows were read.
    pub scope_used: ConsolidationScope,
    /// Set when `scope_used` differs from the preference.
    pub scope_fallback: Option<ScopeFallback>,
    /// The five aggregates.
    pub snapshot: BalanceSheetSnapshot,
}

/// Extracts a [`BalanceSheetSnapshot`] from one period's rows.
///
/// # Errors
/// - [`KessanError::ScopeNotFound`] if neither scope has rows.
/// - [`KessanError::FieldNotFound`] if a label (or the net-assets context) is absent.
/// - [`KessanError::ValueParse`] if a matched row's value is not an integer.
pub fn extract(partition: &PeriodPartition, preference: ConsolidationScope) -> Result<Extraction> {
    let period = partition.period;
    let (scope_used, scoped) = select_scope(partition, preference)?;
    let scope_fallback = (scope_used != preference).then_some(ScopeFallback {
        requested: preference,
        used: scope_used,
    });

    let assets: Vec<&FilingRow> = scoped
        .iter()
        .copied()
        .filter(|r| r.is_class(TagClass::Assets))
        .collect();
    let liabilities: Vec<&FilingRow> = scoped
        .iter()
        .copied()
        .filter(|r| r.is_class(TagClass::Liabilities))
        .collect();

    let subset = |label: ItemLabel| match label.tag_class() {
        TagClass::Assets => assets.as_slice(),
        TagClass::Liabilities => liabilities.as_slice(),
    };

    let snapshot = BalanceSheetSnapshot {
        current_assets: lookup(subset(ItemLabel::CurrentAssets), ItemLabel::CurrentAssets, period)?,
        noncurrent_assets: lookup(
            subset(ItemLabel::NoncurrentAssets),
            ItemLabel::NoncurrentAssets,
            period,
        )?,
        current_liabilities: lookup(
            subset(ItemLabel::CurrentLiabilities),
            ItemLabel::CurrentLiabilities,
            period,
        )?,
        noncurrent_liabilities: lookup(
            subset(ItemLabel::NoncurrentLiabilities),
            ItemLabel::NoncurrentLiabilities,
            period,
        )?,
        net_assets: lookup_net_assets(subset(ItemLabel::NetAssets), period)?,
    };

    debug!(%period, scope = %scope_used, ?snapshot, "Extracted balance sheet");

    Ok(Extraction {
        period,
        scope_used,
        scope_fallback,
        snapshot,
    })
}

/// Picks the rows of the preferred scope, falling back to the opposite one.
fn select_scope(
    partition: &PeriodPartition,
    preference: ConsolidationScope,
) -> Result<(ConsolidationScope, Vec<&FilingRow>)> {
    let rows_of = |scope: ConsolidationScope| -> Vec<&FilingRow> {
        partition
            .rows
            .iter()
            .filter(|r| r.scope == Some(scope))
            .collect()
    };

    let preferred = rows_of(preference);
    if !preferred.is_empty() {
        return Ok((preference, preferred));
    }

    let fallback = preference.opposite();
    let rows = rows_of(fallback);
    if rows.is_empty() {
        return Err(KessanError::ScopeNotFound {
            period: partition.period,
            requested: preference,
            fallback,
        });
    }

    warn!(
        period = %partition.period,
        requested = %preference,
        used = %fallback,
        "No {} rows, using {}",
        preference.label(),
        fallback.label()
    );
    Ok((fallback, rows))
}

/// First row carrying `label`; its value must be an integer.
fn lookup(rows: &[&FilingRow], label: ItemLabel, period: Period) -> Result<i64> {
    rows.iter()
        .find(|r| r.label == Some(label))
        .ok_or(KessanError::FieldNotFound { label, period })?
        .value
        .to_amount(label)
}

/// Net assets: first context candidate that has a matching row wins.
fn lookup_net_assets(rows: &[&FilingRow], period: Period) -> Result<i64> {
    let label = ItemLabel::NetAssets;
    for context in period.net_assets_contexts() {
        let found = rows
            .iter()
            .find(|r| r.label == Some(label) && r.context_id == *context);
        if let Some(row) = found {
            return row.value.to_amount(label);
        }
        debug!(%period, context, "No net assets row for context");
    }
    Err(KessanError::FieldNotFound { label, period })
}

#[cfg(test)]
mod tests {
    use super::*;

    const IND: Option<ConsolidationScope> = Some(ConsolidationScope::Individual);
    const CON: Option<ConsolidationScope> = Some(ConsolidationScope::Consolidated);

    fn full_rows(
        scope: Option<ConsolidationScope>,
        context: &str,
        net_context: &str,
    ) -> Vec<FilingRow> {
        vec![
            FilingRow::new("jppfs_cor:CashAndDeposits", "現金及び預金", context, scope, "5"),
            FilingRow::new("jppfs_cor:CurrentAssets", "流動資産", context, scope, "100"),
            FilingRow::new("jppfs_cor:NoncurrentAssets", "固定資産", context, scope, "50"),
            FilingRow::new("jppfs_cor:CurrentLiabilities", "流動負債", context, scope, "40"),
            FilingRow::new("jppfs_cor:NoncurrentLiabilities", "固定負債", context, scope, "30"),
            FilingRow::new("jppfs_cor:NetAssets", "純資産", net_context, scope, "80"),
        ]
    }

    #[test]
    fn test_extract_individual() {
        let partition = PeriodPartition::new(
            Period::Current,
            full_rows(IND, "CurrentYearInstant", "CurrentYearInstant"),
        );
        let extraction = extract(&partition, ConsolidationScope::Individual).unwrap();
        assert_eq!(
            extraction.snapshot,
            BalanceSheetSnapshot::new(100, 50, 40, 30, 80)
        );
        assert_eq!(extraction.scope_used, ConsolidationScope::Individual);
        assert!(extraction.scope_fallback.is_none());
    }

    #[test]
    fn test_preferred_scope_wins_when_both_present() {
        let mut rows = full_rows(CON, "CurrentYearInstant", "CurrentYearInstant");
        rows.extend(
            full_rows(IND, "CurrentYearInstant", "CurrentYearInstant")
                .into_iter()
                .map(|mut r| {
                    if let crate::types::FactValue::Amount(v) = r.value {
                        r.value = crate::types::FactValue::Amount(v * 10);
                    }
                    r
                }),
        );
        let partition = PeriodPartition::new(Period::Current, rows);

        let individual = extract(&partition, ConsolidationScope::Individual).unwrap();
        assert_eq!(individual.snapshot.current_assets, 1000);
        let consolidated = extract(&partition, ConsolidationScope::Consolidated).unwrap();
        assert_eq!(consolidated.snapshot.current_assets, 100);
    }

    #[test]
    fn test_falls_back_to_consolidated_with_notice() {
        let partition = PeriodPartition::new(
            Period::Current,
            full_rows(CON, "CurrentYearInstant", "CurrentYearInstant"),
        );
        let extraction = extract(&partition, ConsolidationScope::Individual).unwrap();
        assert_eq!(extraction.scope_used, ConsolidationScope::Consolidated);
        assert_eq!(
            extraction.scope_fallback,
            Some(ScopeFallback {
                requested: ConsolidationScope::Individual,
                used: ConsolidationScope::Consolidated,
            })
        );
        assert_eq!(extraction.snapshot.net_assets, 80);
    }

    #[test]
    fn test_no_scope_rows() {
        let partition = PeriodPartition::new(
            Period::Prior,
            full_rows(None, "Prior1YearInstant", "Prior1YearInstant"),
        );
        assert_eq!(
            extract(&partition, ConsolidationScope::Individual).unwrap_err(),
            KessanError::ScopeNotFound {
                period: Period::Prior,
                requested: ConsolidationScope::Individual,
                fallback: ConsolidationScope::Consolidated,
            }
        );
    }

    #[test]
    fn test_net_assets_prefers_member_context() {
        let mut rows = full_rows(IND, "CurrentYearInstant", "CurrentYearInstant");
        rows.push(FilingRow::new(
            "jppfs_cor:NetAssets",
            "純資産",
            "CurrentYearInstant_NonConsolidatedMember",
            IND,
            "75",
        ));
        let partition = PeriodPartition::new(Period::Current, rows);
        let extraction = extract(&partition, ConsolidationScope::Individual).unwrap();
        assert_eq!(extraction.snapshot.net_assets, 75);
    }

    #[test]
    fn test_net_assets_prior_contexts() {
        let partition = PeriodPartition::new(
            Period::Prior,
            full_rows(
                IND,
                "Prior1YearInstant",
                "Prior1YearInstant_NonConsolidatedMember",
            ),
        );
        let extraction = extract(&partition, ConsolidationScope::Individual).unwrap();
        assert_eq!(extraction.snapshot.net_assets, 80);
    }

    #[test]
    fn test_net_assets_prior_falls_back_to_plain_context() {
        let partition = PeriodPartition::new(
            Period::Prior,
            full_rows(IND, "Prior1YearInstant", "Prior1YearInstant"),
        );
        let extraction = extract(&partition, ConsolidationScope::Individual).unwrap();
        assert_eq!(extraction.period, Period::Prior);
        assert_eq!(
            extraction.snapshot,
            BalanceSheetSnapshot::new(100, 50, 40, 30, 80)
        );
    }

    #[test]
    fn test_net_assets_prior_prefers_member_context() {
        let mut rows = full_rows(IND, "Prior1YearInstant", "Prior1YearInstant");
        rows.push(FilingRow::new(
            "jppfs_cor:NetAssets",
            "純資産",
            "Prior1YearInstant_NonConsolidatedMember",
            IND,
            "75",
        ));
        let partition = PeriodPartition::new(Period::Prior, rows);
        let extraction = extract(&partition, ConsolidationScope::Individual).unwrap();
        assert_eq!(extraction.snapshot.net_assets, 75);
    }

    #[test]
    fn test_net_assets_wrong_context_is_not_found() {
        // a current-period context in a prior partition does not qualify
        let partition = PeriodPartition::new(
            Period::Prior,
            full_rows(IND, "Prior1YearInstant", "CurrentYearInstant"),
        );
        assert_eq!(
            extract(&partition, ConsolidationScope::Individual).unwrap_err(),
            KessanError::FieldNotFound {
                label: ItemLabel::NetAssets,
                period: Period::Prior,
            }
        );
    }

    #[test]
    fn test_missing_current_assets_is_not_zero() {
        let rows = full_rows(IND, "CurrentYearInstant", "CurrentYearInstant")
            .into_iter()
            .filter(|r| r.item_name != "流動資産")
            .collect();
        let partition = PeriodPartition::new(Period::Current, rows);
        let err = extract(&partition, ConsolidationScope::Individual).unwrap_err();
        assert_eq!(
            err,
            KessanError::FieldNotFound {
                label: ItemLabel::CurrentAssets,
                period: Period::Current,
            }
        );
        assert!(err.to_string().contains("流動資産"));
    }

    #[test]
    fn test_label_outside_tag_class_is_ignored() {
        // 流動負債 tagged without "liabilities" is not in the liabilities subset
        let rows = full_rows(IND, "CurrentYearInstant", "CurrentYearInstant")
            .into_iter()
            .map(|mut r| {
                if r.item_name == "流動負債" {
                    r.element_id = "jppfs_cor:CurrentDebts".to_string();
                }
                r
            })
            .collect();
        let partition = PeriodPartition::new(Period::Current, rows);
        assert_eq!(
            extract(&partition, ConsolidationScope::Individual).unwrap_err(),
            KessanError::FieldNotFound {
                label: ItemLabel::CurrentLiabilities,
                period: Period::Current,
            }
        );
    }

    #[test]
    fn test_first_match_wins() {
        let mut rows = full_rows(IND, "CurrentYearInstant", "CurrentYearInstant");
        rows.push(FilingRow::new(
            "jppfs_cor:CurrentAssets",
            "流動資産",
            "CurrentYearInstant",
            IND,
            "999",
        ));
        let partition = PeriodPartition::new(Period::Current, rows);
        let extraction = extract(&partition, ConsolidationScope::Individual).unwrap();
        assert_eq!(extraction.snapshot.current_assets, 100);
    }

    #[test]
    fn test_unparseable_value_is_distinct_from_missing_row() {
        let rows = full_rows(IND, "CurrentYearInstant", "CurrentYearInstant")
            .into_iter()
            .map(|r| {
                if r.item_name == "固定資産" {
                    FilingRow::new(r.element_id, r.item_name, r.context_id, r.scope, "－")
                } else {
                    r
                }
            })
            .collect();
        let partition = PeriodPartition::new(Period::Current, rows);
        assert_eq!(
            extract(&partition, ConsolidationScope::Individual).unwrap_err(),
            KessanError::ValueParse {
                label: ItemLabel::NoncurrentAssets,
                raw: "－".to_string(),
            }
        );
    }
}
