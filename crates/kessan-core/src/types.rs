//! Core data types for disclosure filings.
//!
//! This module defines the fundamental data structures:
//!
//! - [`DocId`] - Filing document id
//! - [`ItemLabel`] - The closed set of balance-sheet aggregates that are extracted
//! - [`FactValue`] - A parsed value cell
//! - [`FilingRow`] - One typed row of a filing's tabular export
//! - [`PeriodPartition`] - Typed rows restricted to one period
//! - [`BalanceSheetSnapshot`] - The five aggregates for one (filing, period) pair
//! - [`DocumentMeta`] - One entry of the disclosure API's document list

use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{KessanError, Result};
use crate::period::{ConsolidationScope, Period};
use crate::table::{
    CONTEXT_ID_COLUMN, ELEMENT_ID_COLUMN, ITEM_NAME_COLUMN, RawTable, SCOPE_COLUMN, VALUE_COLUMN,
};

/// A filing document id (e.g. `S100ABCD`).
///
/// Ids are trimmed and uppercased on creation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocId(String);

impl DocId {
    /// Creates a new document id, trimming whitespace and converting to uppercase.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into().trim().to_uppercase())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for DocId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DocId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Which tag-class subset a label is searched in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TagClass {
    /// Rows whose element id contains "assets" (case-insensitive).
    Assets,
    /// Rows whose element id contains "liabilities" (case-insensitive).
    Liabilities,
}

impl TagClass {
    /// Lowercase substring an element id must contain.
    #[must_use]
    pub const fn needle(&self) -> &'static str {
        match self {
            Self::Assets => "assets",
            Self::Liabilities => "liabilities",
        }
    }

    /// Returns true if the element id belongs to this class.
    #[must_use]
    pub fn matches(&self, element_id: &str) -> bool {
        element_id.to_lowercase().contains(self.needle())
    }
}

/// The balance-sheet aggregates located by the extractor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemLabel {
    /// 流動資産
    CurrentAssets,
    /// 固定資産
    NoncurrentAssets,
    /// 流動負債
    CurrentLiabilities,
    /// 固定負債
    NoncurrentLiabilities,
    /// 純資産
    NetAssets,
}

impl ItemLabel {
    /// All recognized labels in display-column order.
    pub const ALL: [Self; 5] = [
        Self::CurrentLiabilities,
        Self::NoncurrentLiabilities,
        Self::CurrentAssets,
        Self::NoncurrentAssets,
        Self::NetAssets,
    ];

    /// The item name exactly as it appears in the export.
    #[must_use]
    pub const fn item_name(&self) -> &'static str {
        match self {
            Self::CurrentAssets => "流動資産",
            Self::NoncurrentAssets => "固定資産",
            Self::CurrentLiabilities => "流動負債",
            Self::NoncurrentLiabilities => "固定負債",
            Self::NetAssets => "純資産",
        }
    }

    /// English field name used in narrative prompts.
    #[must_use]
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::CurrentAssets => "CurrentAssets",
            Self::NoncurrentAssets => "NoncurrentAssets",
            Self::CurrentLiabilities => "CurrentLiabilities",
            Self::NoncurrentLiabilities => "NoncurrentLiabilities",
            Self::NetAssets => "NetAssets",
        }
    }

    /// Column name in the two-row display table.
    #[must_use]
    pub const fn column_name(&self) -> &'static str {
        match self {
            Self::CurrentAssets => "CurrentAssets(流動資産)",
            Self::NoncurrentAssets => "NoncurrentAssets(固定資産)",
            Self::CurrentLiabilities => "CurrentLiabilities(流動負債)",
            Self::NoncurrentLiabilities => "NoncurrentLiabilities(固定負債)",
            Self::NetAssets => "NetAssets(純資産)",
        }
    }

    /// The tag-class subset this label is looked up in.
    ///
    /// Net assets is tagged `NetAssets`, so it lives in the assets subset.
    #[must_use]
    pub const fn tag_class(&self) -> TagClass {
        match self {
            Self::CurrentAssets | Self::NoncurrentAssets | Self::NetAssets => TagClass::Assets,
            Self::CurrentLiabilities | Self::NoncurrentLiabilities => TagClass::Liabilities,
        }
    }

    /// Recognizes an exact item name.
    #[must_use]
    pub fn from_item_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.item_name() == name)
    }
}

impl fmt::Display for ItemLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.item_name())
    }
}

/// A value cell of the export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactValue {
    /// An integer amount in yen.
    Amount(i64),
    /// Empty cell.
    Missing,
    /// Non-integer contents, kept verbatim (e.g. "－", "0.52", free text).
    Invalid(String),
}

impl FactValue {
    /// Parses a raw cell.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Missing;
        }
        match trimmed.parse::<i64>() {
            Ok(v) => Self::Amount(v),
            Err(_) => Self::Invalid(trimmed.to_string()),
        }
    }

    /// Coerces to an integer, attributing failures to `label`.
    pub fn to_amount(&self, label: ItemLabel) -> Result<i64> {
        match self {
            Self::Amount(v) => Ok(*v),
            Self::Missing => Err(KessanError::ValueParse {
                label,
                raw: String::new(),
            }),
            Self::Invalid(raw) => Err(KessanError::ValueParse {
                label,
                raw: raw.clone(),
            }),
        }
    }
}

/// One typed row of a filing's tabular export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilingRow {
    /// Taxonomy tag (case-sensitive as exported).
    pub element_id: String,
    /// Human-readable item name.
    pub item_name: String,
    /// Recognized aggregate label, resolved from `item_name` at parse time.
    pub label: Option<ItemLabel>,
    /// Period/scope context id.
    pub context_id: String,
    /// Consolidation scope; `None` for rows reported under neither convention.
    pub scope: Option<ConsolidationScope>,
    /// Parsed value cell.
    pub value: FactValue,
}

impl FilingRow {
    /// Creates a row from raw cells.
    #[must_use]
    pub fn new(
        element_id: impl Into<String>,
        item_name: impl Into<String>,
        context_id: impl Into<String>,
        scope: Option<ConsolidationScope>,
        value: &str,
    ) -> Self {
        let item_name = item_name.into();
        Self {
            element_id: element_id.into(),
            label: ItemLabel::from_item_name(&item_name),
            item_name,
            context_id: context_id.into(),
            scope,
            value: FactValue::parse(value),
        }
    }

    /// Returns true if the row belongs to the given tag class.
    #[must_use]
    pub fn is_class(&self, class: TagClass) -> bool {
        class.matches(&self.element_id)
    }
}

/// Typed rows of one period, in source order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeriodPartition {
    /// Which period these rows describe.
    pub period: Period,
    /// Rows in source order.
    pub rows: Vec<FilingRow>,
}

impl PeriodPartition {
    /// Creates a partition from already-typed rows.
    #[must_use]
    pub const fn new(period: Period, rows: Vec<FilingRow>) -> Self {
        Self { period, rows }
    }

    /// Parses a period table into typed rows.
    ///
    /// # Errors
    /// Returns [`KessanError::Schema`] if any of the element id, item name,
    /// context id, scope or value columns is absent.
    pub fn from_table(period: Period, table: &RawTable) -> Result<Self> {
        let element = table.column_index(ELEMENT_ID_COLUMN)?;
        let item = table.column_index(ITEM_NAME_COLUMN)?;
        let context = table.column_index(CONTEXT_ID_COLUMN)?;
        let scope = table.column_index(SCOPE_COLUMN)?;
        let value = table.column_index(VALUE_COLUMN)?;

        let rows = table
            .records()
            .iter()
            .map(|record| {
                let cell = |i: usize| record.get(i).map(String::as_str).unwrap_or_default();
                FilingRow::new(
                    cell(element),
                    cell(item),
                    cell(context),
                    ConsolidationScope::from_cell(cell(scope)),
                    cell(value),
                )
            })
            .collect();

        Ok(Self { period, rows })
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Row of the two-row display table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotRow {
    /// Holds current and noncurrent assets.
    Assets,
    /// Holds current and noncurrent liabilities plus net assets.
    Liabilities,
}

impl SnapshotRow {
    /// Row label in the display table.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Assets => "Assets(資産)",
            Self::Liabilities => "Liabilities(負債)",
        }
    }

    /// Which row a label's value is displayed in.
    #[must_use]
    pub const fn of(label: ItemLabel) -> Self {
        match label {
            ItemLabel::CurrentAssets | ItemLabel::NoncurrentAssets => Self::Assets,
            ItemLabel::CurrentLiabilities
            | ItemLabel::NoncurrentLiabilities
            | ItemLabel::NetAssets => Self::Liabilities,
        }
    }
}

/// The five balance-sheet aggregates of one (filing, period) pair, in yen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceSheetSnapshot {
    /// 流動資産
    pub current_assets: i64,
    /// 固定資産
    pub noncurrent_assets: i64,
    /// 流動負債
    pub current_liabilities: i64,
    /// 固定負債
    pub noncurrent_liabilities: i64,
    /// 純資産
    pub net_assets: i64,
}

impl BalanceSheetSnapshot {
    /// Creates a snapshot from the five aggregates.
    #[must_use]
    pub const fn new(
        current_assets: i64,
        noncurrent_assets: i64,
        current_liabilities: i64,
        noncurrent_liabilities: i64,
        net_assets: i64,
    ) -> Self {
        Self {
            current_assets,
            noncurrent_assets,
            current_liabilities,
            noncurrent_liabilities,
            net_assets,
        }
    }

    /// Returns the value of a field by label.
    #[must_use]
    pub const fn get(&self, label: ItemLabel) -> i64 {
        match label {
            ItemLabel::CurrentAssets => self.current_assets,
            ItemLabel::NoncurrentAssets => self.noncurrent_assets,
            ItemLabel::CurrentLiabilities => self.current_liabilities,
            ItemLabel::NoncurrentLiabilities => self.noncurrent_liabilities,
            ItemLabel::NetAssets => self.net_assets,
        }
    }

    /// Value shown in a cell of the two-row table; slots a row does not hold are 0.
    #[must_use]
    pub const fn cell(&self, row: SnapshotRow, label: ItemLabel) -> i64 {
        match (row, SnapshotRow::of(label)) {
            (SnapshotRow::Assets, SnapshotRow::Assets)
            | (SnapshotRow::Liabilities, SnapshotRow::Liabilities) => self.get(label),
            _ => 0,
        }
    }

    /// Renders the snapshot as the two-row display table.
    ///
    /// Columns: `Name`, then one column per label in [`ItemLabel::ALL`] order.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let rows = [SnapshotRow::Assets, SnapshotRow::Liabilities];
        let mut columns = Vec::with_capacity(ItemLabel::ALL.len() + 1);
        columns.push(Column::new(
            "Name".into(),
            rows.iter().map(SnapshotRow::name).collect::<Vec<_>>(),
        ));
        for label in ItemLabel::ALL {
            columns.push(Column::new(
                label.column_name().into(),
                rows.iter()
                    .map(|row| self.cell(*row, label))
                    .collect::<Vec<i64>>(),
            ));
        }
        DataFrame::new(columns).map_err(|e| KessanError::Other(e.to_string()))
    }
}

/// One entry of the disclosure API's document list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMeta {
    /// Document id.
    #[serde(rename = "docID")]
    pub doc_id: DocId,
    /// Filer (company) name.
    #[serde(default)]
    pub filer_name: Option<String>,
    /// EDINET filer code.
    #[serde(default)]
    pub edinet_code: Option<String>,
    /// Securities code.
    #[serde(default)]
    pub sec_code: Option<String>,
    /// Document type code (e.g. "120" for an annual securities report).
    #[serde(default)]
    pub doc_type_code: Option<String>,
    /// Start of the reported period.
    #[serde(default)]
    pub period_start: Option<NaiveDate>,
    /// End of the reported period.
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
    /// Submission timestamp as reported ("YYYY-MM-DD hh:mm").
    #[serde(default)]
    pub submit_date_time: Option<String>,
    /// Free-text description.
    #[serde(default)]
    pub doc_description: Option<String>,
}

impl DocumentMeta {
    /// Creates an entry with only the id and filer name set.
    #[must_use]
    pub fn new(doc_id: DocId, filer_name: impl Into<String>) -> Self {
        Self {
            doc_id,
            filer_name: Some(filer_name.into()),
            ..Default::default()
        }
    }

    /// Returns true if the filer name matches exactly.
    #[must_use]
    pub fn is_filed_by(&self, filer_name: &str) -> bool {
        self.filer_name.as_deref() == Some(filer_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_creation() {
        let id = DocId::new(" s100abcd ");
        assert_eq!(id.as_str(), "S100ABCD");
        assert_eq!(id.to_string(), "S100ABCD");
    }

    #[test]
    fn test_fact_value_parse() {
        assert_eq!(FactValue::parse("123"), FactValue::Amount(123));
        assert_eq!(FactValue::parse(" -45 "), FactValue::Amount(-45));
        assert_eq!(FactValue::parse(""), FactValue::Missing);
        assert_eq!(FactValue::parse("－"), FactValue::Invalid("－".to_string()));
        assert_eq!(FactValue::parse("0.52"), FactValue::Invalid("0.52".to_string()));
    }

    #[test]
    fn test_fact_value_to_amount_errors_name_label() {
        let err = FactValue::Missing
            .to_amount(ItemLabel::NetAssets)
            .unwrap_err();
        assert_eq!(
            err,
            KessanError::ValueParse {
                label: ItemLabel::NetAssets,
                raw: String::new()
            }
        );
    }

    #[test]
    fn test_tag_class_is_case_insensitive() {
        assert!(TagClass::Assets.matches("jppfs_cor:CurrentAssets"));
        assert!(TagClass::Assets.matches("jppfs_cor:NetAssets"));
        assert!(TagClass::Liabilities.matches("jppfs_cor:NoncurrentLIABILITIES"));
        assert!(!TagClass::Liabilities.matches("jppfs_cor:CurrentAssets"));
    }

    #[test]
    fn test_row_resolves_label() {
        let row = FilingRow::new(
            "jppfs_cor:CurrentAssets",
            "流動資産",
            "CurrentYearInstant",
            Some(ConsolidationScope::Individual),
            "100",
        );
        assert_eq!(row.label, Some(ItemLabel::CurrentAssets));

        let other = FilingRow::new("x", "流動資産合計", "CurrentYearInstant", None, "1");
        assert_eq!(other.label, None);
    }

    #[test]
    fn test_snapshot_two_row_table() {
        let snapshot = BalanceSheetSnapshot::new(100, 50, 40, 30, 80);
        assert_eq!(
            snapshot.cell(SnapshotRow::Assets, ItemLabel::CurrentAssets),
            100
        );
        assert_eq!(snapshot.cell(SnapshotRow::Assets, ItemLabel::NetAssets), 0);
        assert_eq!(
            snapshot.cell(SnapshotRow::Liabilities, ItemLabel::NetAssets),
            80
        );
        assert_eq!(
            snapshot.cell(SnapshotRow::Liabilities, ItemLabel::CurrentAssets),
            0
        );

        let df = snapshot.to_frame().unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 6);
        let net = df.column("NetAssets(純資産)").unwrap().i64().unwrap();
        assert_eq!(net.get(0), Some(0));
        assert_eq!(net.get(1), Some(80));
    }

    #[test]
    fn test_document_meta_deserialize() {
        let json = r#"{
            "seqNumber": 1,
            "docID": "S100ABCD",
            "edinetCode": "E12345",
            "secCode": null,
            "filerName": "明治安田アセットマネジメント株式会社",
            "docTypeCode": "120",
            "periodStart": "2023-04-01",
            "periodEnd": "2024-03-31",
            "submitDateTime": "2024-06-25 15:00",
            "docDescription": "有価証券報告書"
        }"#;
        let meta: DocumentMeta = serde_json::from_str(json).unwrap();
        assert_eq!(meta.doc_id, DocId::new("S100ABCD"));
        assert!(meta.is_filed_by("明治安田アセットマネジメント株式会社"));
        assert_eq!(meta.sec_code, None);
        assert_eq!(
            meta.period_end,
            NaiveDate::from_ymd_opt(2024, 3, 31)
        );
    }
}
