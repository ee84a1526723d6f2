//! Period splitting of a filing's export.
//!
//! [`split`] partitions a [`RawTable`] into prior-period and current-period
//! tables by testing whether the context id contains "Prior". The split is
//! stable, total and disjoint, and idempotent on an already-split table.

use tracing::debug;

use crate::error::Result;
use crate::period::Period;
use crate::table::RawTable;

/// A table split into its two periods.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PeriodSplit {
    /// Rows whose context id contains "Prior".
    pub prior: RawTable,
    /// All other rows, including rows with an empty context id.
    pub current: RawTable,
}

impl PeriodSplit {
    /// Returns the table for a period.
    #[must_use]
    pub const fn get(&self, period: Period) -> &RawTable {
        match period {
            Period::Prior => &self.prior,
            Period::Current => &self.current,
        }
    }

    /// Total number of rows across both periods.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prior.len() + self.current.len()
    }

    /// Returns true if both periods are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prior.is_empty() && self.current.is_empty()
    }
}

/// Partitions `table` by period using the named context column.
///
/// Source order is preserved within each partition.
///
/// # Errors
/// Returns [`KessanError::Schema`](crate::KessanError::Schema) if the context
/// column is absent.
pub fn split(table: RawTable, context_column: &str) -> Result<PeriodSplit> {
    let context = table.column_index(context_column)?;
    let (headers, records) = table.into_parts();

    let (prior, current): (Vec<_>, Vec<_>) = records.into_iter().partition(|record| {
        let context_id = record.get(context).map(String::as_str).unwrap_or_default();
        Period::of_context(context_id) == Period::Prior
    });

    debug!(
        prior = prior.len(),
        current = current.len(),
        "Split export by period"
    );

    Ok(PeriodSplit {
        prior: RawTable::new(headers.clone(), prior),
        current: RawTable::new(headers, current),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KessanError;
    use crate::table::CONTEXT_ID_COLUMN;

    fn table(contexts: &[&str]) -> RawTable {
        RawTable::new(
            vec!["idx".to_string(), CONTEXT_ID_COLUMN.to_string()],
            contexts
                .iter()
                .enumerate()
                .map(|(i, c)| vec![i.to_string(), (*c).to_string()])
                .collect(),
        )
    }

    #[test]
    fn test_split_is_total_disjoint_and_stable() {
        let input = table(&[
            "CurrentYearInstant",
            "Prior1YearInstant",
            "",
            "Prior1YearDuration_NonConsolidatedMember",
            "FilingDateInstant",
        ]);
        let n = input.len();
        let split = split(input, CONTEXT_ID_COLUMN).unwrap();

        assert_eq!(split.len(), n);
        let prior_idx: Vec<_> = split.prior.records().iter().map(|r| r[0].as_str()).collect();
        let current_idx: Vec<_> = split
            .current
            .records()
            .iter()
            .map(|r| r[0].as_str())
            .collect();
        assert_eq!(prior_idx, vec!["1", "3"]);
        assert_eq!(current_idx, vec!["0", "2", "4"]);
    }

    #[test]
    fn test_short_row_goes_to_current() {
        let input = RawTable::new(
            vec!["idx".to_string(), CONTEXT_ID_COLUMN.to_string()],
            vec![vec!["0".to_string()]],
        );
        let split = split(input, CONTEXT_ID_COLUMN).unwrap();
        assert_eq!(split.current.len(), 1);
        assert!(split.prior.is_empty());
    }

    #[test]
    fn test_resplitting_current_is_idempotent() {
        let first = split(
            table(&["CurrentYearInstant", "Prior1YearInstant", "CurrentYearDuration"]),
            CONTEXT_ID_COLUMN,
        )
        .unwrap();
        let current = first.current.clone();

        let again = split(first.current, CONTEXT_ID_COLUMN).unwrap();
        assert_eq!(again.current, current);
        assert!(again.prior.is_empty());
        assert_eq!(again.prior.headers(), current.headers());
    }

    #[test]
    fn test_missing_context_column() {
        let input = RawTable::new(vec!["idx".to_string()], vec![vec!["0".to_string()]]);
        assert_eq!(
            split(input, CONTEXT_ID_COLUMN),
            Err(KessanError::Schema {
                column: CONTEXT_ID_COLUMN.to_string()
            })
        );
    }
}
