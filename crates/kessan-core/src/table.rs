//! Untyped tabular exports.
//!
//! A [`RawTable`] is a filing's decoded tabular export: a header row and string
//! cells. It is what the retrieval layer hands over, what the splitter
//! partitions, and what is persisted as a derived CSV artifact.

use std::io::Read;

use crate::error::{KessanError, Result};

/// Element (taxonomy tag) column.
pub const ELEMENT_ID_COLUMN: &str = "要素ID";
/// Item name column.
pub const ITEM_NAME_COLUMN: &str = "項目名";
/// Context id column.
pub const CONTEXT_ID_COLUMN: &str = "コンテキストID";
/// Consolidation scope column.
pub const SCOPE_COLUMN: &str = "連結・個別";
/// Value column.
pub const VALUE_COLUMN: &str = "値";

/// A decoded tabular export: header plus string cells, in source order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawTable {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
}

impl RawTable {
    /// Creates a table from a header and records.
    #[must_use]
    pub const fn new(headers: Vec<String>, records: Vec<Vec<String>>) -> Self {
        Self { headers, records }
    }

    /// Reads delimited text with a header row.
    ///
    /// Quoted fields are unquoted; rows may be ragged (missing trailing cells
    /// read as empty).
    pub fn from_reader<R: Read>(reader: R, delimiter: u8) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| KessanError::Parse(format!("Failed to read header: {e}")))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect::<Vec<_>>();

        let mut records = Vec::new();
        for record in rdr.records() {
            let record =
                record.map_err(|e| KessanError::Parse(format!("Failed to read record: {e}")))?;
            records.push(record.iter().map(str::to_string).collect());
        }

        Ok(Self { headers, records })
    }

    /// Parses tab-separated text (the disclosure export format).
    pub fn from_tsv(text: &str) -> Result<Self> {
        Self::from_reader(strip_bom(text).as_bytes(), b'\t')
    }

    /// Parses comma-separated text (the derived-artifact format).
    pub fn from_csv(text: &str) -> Result<Self> {
        Self::from_reader(strip_bom(text).as_bytes(), b',')
    }

    /// Writes the table as comma-separated text with a header row.
    pub fn to_csv(&self) -> Result<String> {
        let mut wtr = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        wtr.write_record(&self.headers)
            .map_err(|e| KessanError::Parse(e.to_string()))?;
        for record in &self.records {
            wtr.write_record(record)
                .map_err(|e| KessanError::Parse(e.to_string()))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| KessanError::Parse(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| KessanError::Parse(e.to_string()))
    }

    /// Returns the header row.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Returns the records in source order.
    #[must_use]
    pub fn records(&self) -> &[Vec<String>] {
        &self.records
    }

    /// Consumes the table and returns header and records.
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<Vec<String>>) {
        (self.headers, self.records)
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Position of a column by exact name.
    ///
    /// # Errors
    /// Returns [`KessanError::Schema`] if the column is absent.
    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| KessanError::Schema {
                column: name.to_string(),
            })
    }
}

fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{feff}\"要素ID\"\t\"項目名\"\t\"コンテキストID\"\t\"連結・個別\"\t\"値\"\n\
        \"jppfs_cor:CurrentAssets\"\t\"流動資産\"\t\"CurrentYearInstant\"\t\"個別\"\t\"100\"\n\
        \"jppfs_cor:CurrentAssets\"\t\"流動資産\"\t\"Prior1YearInstant\"\t\"個別\"\n";

    #[test]
    fn test_from_tsv_strips_bom_and_quotes() {
        let table = RawTable::from_tsv(SAMPLE).unwrap();
        assert_eq!(table.headers()[0], ELEMENT_ID_COLUMN);
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[0][4], "100");
        // ragged row keeps what it has
        assert_eq!(table.records()[1].len(), 4);
    }

    #[test]
    fn test_column_index_missing_is_schema_error() {
        let table = RawTable::from_tsv(SAMPLE).unwrap();
        assert_eq!(table.column_index(VALUE_COLUMN).unwrap(), 4);
        assert_eq!(
            table.column_index("相対年度"),
            Err(KessanError::Schema {
                column: "相対年度".to_string()
            })
        );
    }

    #[test]
    fn test_csv_reread_matches() {
        let table = RawTable::from_tsv(SAMPLE).unwrap();
        let csv = table.to_csv().unwrap();
        assert_eq!(RawTable::from_csv(&csv).unwrap(), table);
    }
}
