//! Purpose: Dynamic-schema table model backing every prospect operation.
//! Exports: `Table`, `Cell`, well-known column names, date helpers.
//! Role: Whole-file CSV load/save plus the coercions the operations share.
//! Invariants: Column order is authoritative; every row has one cell per column.
//! Invariants: Empty CSV cells load as `Cell::Null` and persist back as "".

use std::path::Path;

use serde_json::{Map, Number, Value};
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::core::error::{Error, ErrorKind};

pub const DEDUPE_COLUMN: &str = "LinkedIn URL";
pub const SCORE_COLUMN: &str = "v2 Score";
pub const LOCATION_COLUMN: &str = "Location";
pub const COMPANY_COLUMN: &str = "Company";
pub const COMPANY_SIZE_COLUMN: &str = "Company Size";
pub const CURRENT_ROLE_COLUMN: &str = "CURRENT Role Mention";
pub const FOUND_DATE_COLUMN: &str = "Found Date";

pub const DEFAULT_SEARCH_COLUMNS: &[&str] = &[
    "Headline",
    COMPANY_COLUMN,
    "Match Reason",
    CURRENT_ROLE_COLUMN,
];

const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// One table cell. CSV cells load as `Text` (empty fields as `Null`);
/// `Number` appears after numeric coercion or from JSON input.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Text(String),
    Number(f64),
}

impl Cell {
    pub fn from_json(value: &Value) -> Cell {
        match value {
            Value::Null => Cell::Null,
            Value::String(text) if text.is_empty() => Cell::Null,
            Value::String(text) => Cell::Text(text.clone()),
            Value::Number(number) => number
                .as_f64()
                .map(Cell::Number)
                .unwrap_or(Cell::Null),
            Value::Bool(true) => Cell::Text("true".to_string()),
            Value::Bool(false) => Cell::Text("false".to_string()),
            other => Cell::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(text) => Some(text),
            _ => None,
        }
    }

    /// String form for substring matching and key normalization.
    /// `None` for null cells, which never match and carry no key text.
    pub fn display_string(&self) -> Option<String> {
        match self {
            Cell::Null => None,
            Cell::Text(text) => Some(text.clone()),
            Cell::Number(number) => Some(format!("{number}")),
        }
    }

    /// Numeric view used for score predicates and ordering.
    pub fn as_score(&self) -> Option<f64> {
        match self {
            Cell::Number(number) => Some(*number),
            Cell::Text(text) => text.trim().parse::<f64>().ok(),
            Cell::Null => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Cell::Null => Value::String(String::new()),
            Cell::Text(text) => Value::String(text.clone()),
            Cell::Number(number) => Number::from_f64(*number)
                .map(Value::Number)
                .unwrap_or_else(|| Value::String(number.to_string())),
        }
    }

    fn to_csv_field(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Text(text) => text.clone(),
            Cell::Number(number) => format!("{number}"),
        }
    }
}

/// In-memory table: ordered column names plus rows of cells parallel to them.
/// Exists only for the duration of one operation; the file is the durable form.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    pub(crate) columns: Vec<String>,
    pub(crate) rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Load the full table. A missing file is `NotFound`; an existing file
    /// that is not valid tabular data is `Parse` and aborts the operation.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match Self::load_optional(path)? {
            Some(table) => Ok(table),
            None => Err(Error::new(ErrorKind::NotFound)
                .with_message("file not found")
                .with_path(path)),
        }
    }

    /// Load the full table, mapping a missing file to `None` so read-only
    /// operations can treat it as an empty result.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, Error> {
        if !path.exists() {
            return Ok(None);
        }
        let mut reader = csv::ReaderBuilder::new().from_path(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to open table file")
                .with_path(path)
                .with_source(err)
        })?;
        let headers = reader
            .headers()
            .map_err(|err| {
                Error::new(ErrorKind::Parse)
                    .with_message("failed to read table header")
                    .with_path(path)
                    .with_source(err)
            })?
            .clone();
        if headers.is_empty() {
            return Err(Error::new(ErrorKind::Parse)
                .with_message("table file has no header row")
                .with_path(path));
        }
        let columns = headers.iter().map(str::to_string).collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|err| {
                Error::new(ErrorKind::Parse)
                    .with_message("invalid tabular data")
                    .with_path(path)
                    .with_source(err)
            })?;
            let row = record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Cell::Null
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect::<Vec<_>>();
            rows.push(row);
        }
        Ok(Some(Self { columns, rows }))
    }

    /// Persist the table, overwriting the destination file in place.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        let mut writer = csv::Writer::from_path(path).map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to open table file for writing")
                .with_path(path)
                .with_source(err)
        })?;
        let write_err = |err: csv::Error| {
            Error::new(ErrorKind::Io)
                .with_message("failed to write table file")
                .with_path(path)
                .with_source(err)
        };
        writer.write_record(&self.columns).map_err(write_err)?;
        for row in &self.rows {
            writer
                .write_record(row.iter().map(Cell::to_csv_field))
                .map_err(write_err)?;
        }
        writer.flush().map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to flush table file")
                .with_path(path)
                .with_source(err)
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        debug_assert_eq!(row.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn truncate(&mut self, len: usize) {
        self.rows.truncate(len);
    }

    pub fn retain_rows(&mut self, mut keep: impl FnMut(&[Cell]) -> bool) {
        self.rows.retain(|row| keep(row));
    }

    /// Coerce the score column: text that parses becomes `Number`, text that
    /// does not becomes `Null`. Returns the column index when present.
    pub fn coerce_score_column(&mut self) -> Option<usize> {
        let index = self.column_index(SCORE_COLUMN)?;
        for row in &mut self.rows {
            row[index] = match row[index].as_score() {
                Some(score) => Cell::Number(score),
                None => Cell::Null,
            };
        }
        Some(index)
    }

    /// Stable descending sort by score; null scores keep load order at the end.
    /// No-op when the score column is absent.
    pub fn sort_by_score_desc(&mut self) {
        let Some(index) = self.column_index(SCORE_COLUMN) else {
            return;
        };
        self.rows.sort_by(|a, b| {
            match (a[index].as_score(), b[index].as_score()) {
                (Some(left), Some(right)) => right
                    .partial_cmp(&left)
                    .unwrap_or(std::cmp::Ordering::Equal),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        });
    }

    /// Project onto the given column order. Columns absent from the source
    /// yield `Null` cells; source columns not requested are dropped.
    pub fn reindex(&self, columns: &[String]) -> Table {
        let sources = columns
            .iter()
            .map(|column| self.column_index(column))
            .collect::<Vec<_>>();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                sources
                    .iter()
                    .map(|source| match source {
                        Some(index) => row[*index].clone(),
                        None => Cell::Null,
                    })
                    .collect()
            })
            .collect();
        Table {
            columns: columns.to_vec(),
            rows,
        }
    }

    /// Render rows as JSON objects in column order; nulls render as "".
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(column, cell)| (column.clone(), cell.to_json()))
                    .collect()
            })
            .collect()
    }
}

/// Parse a `Found Date` value. Anything past a `T` or a space is ignored so
/// timestamped exports still bucket by day; unparseable input is `None`.
pub fn parse_date(raw: &str) -> Option<Date> {
    let trimmed = raw.trim();
    let date_part = trimmed
        .split_once(['T', ' '])
        .map(|(date, _)| date)
        .unwrap_or(trimmed);
    Date::parse(date_part, DATE_FORMAT).ok()
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT)
        .unwrap_or_else(|_| date.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Month;

    fn sample_table() -> Table {
        let mut table = Table::new(vec![
            "LinkedIn URL".to_string(),
            "v2 Score".to_string(),
            "Location".to_string(),
        ]);
        table.push_row(vec![
            Cell::Text("https://linkedin.com/in/a".to_string()),
            Cell::Text("21".to_string()),
            Cell::Text("Berlin, Germany".to_string()),
        ]);
        table.push_row(vec![
            Cell::Text("https://linkedin.com/in/b".to_string()),
            Cell::Text("not-a-score".to_string()),
            Cell::Null,
        ]);
        table
    }

    #[test]
    fn save_and_load_round_trip_preserves_nulls() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prospects.csv");
        let table = sample_table();
        table.save(&path).expect("save");

        let loaded = Table::load(&path).expect("load");
        assert_eq!(loaded.columns(), table.columns());
        assert_eq!(loaded.len(), 2);
        assert!(loaded.rows()[1][2].is_null());
    }

    #[test]
    fn missing_file_is_not_found_and_optional_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.csv");
        let err = Table::load(&path).expect_err("missing file");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(Table::load_optional(&path).expect("optional").is_none());
    }

    #[test]
    fn ragged_rows_are_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ragged.csv");
        std::fs::write(&path, "a,b\n1,2,3\n").expect("write");
        let err = Table::load(&path).expect_err("ragged");
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn coerce_score_column_nulls_out_bad_values() {
        let mut table = sample_table();
        let index = table.coerce_score_column().expect("score column");
        assert_eq!(table.rows()[0][index], Cell::Number(21.0));
        assert!(table.rows()[1][index].is_null());
    }

    #[test]
    fn sort_by_score_desc_places_null_scores_last() {
        let mut table = Table::new(vec!["v2 Score".to_string()]);
        table.push_row(vec![Cell::Text("5".to_string())]);
        table.push_row(vec![Cell::Null]);
        table.push_row(vec![Cell::Text("20".to_string())]);
        table.sort_by_score_desc();
        assert_eq!(table.rows()[0][0].as_score(), Some(20.0));
        assert_eq!(table.rows()[1][0].as_score(), Some(5.0));
        assert!(table.rows()[2][0].is_null());
    }

    #[test]
    fn reindex_drops_extra_columns_and_fills_missing_with_null() {
        let table = sample_table();
        let reindexed = table.reindex(&["Location".to_string(), "Company".to_string()]);
        assert_eq!(reindexed.columns(), ["Location", "Company"]);
        assert_eq!(
            reindexed.rows()[0][0].as_text(),
            Some("Berlin, Germany")
        );
        assert!(reindexed.rows()[0][1].is_null());
    }

    #[test]
    fn records_render_nulls_as_empty_strings() {
        let table = sample_table();
        let records = table.records();
        assert_eq!(records[1]["Location"], Value::String(String::new()));
    }

    #[test]
    fn parse_date_accepts_iso_and_timestamp_prefixes() {
        let date = parse_date("2026-02-16").expect("plain date");
        assert_eq!(date.month(), Month::February);
        assert!(parse_date("2026-02-16T09:30:00Z").is_some());
        assert!(parse_date("2026-02-16 09:30:00").is_some());
        assert!(parse_date("yesterday").is_none());
        assert_eq!(format_date(date), "2026-02-16");
    }
}
