// Maintenance deduplication plus the key-normalization helpers append shares.
// Keys are the trimmed string form of the dedupe cell; null keys collapse to "".
use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Serialize;

use crate::core::error::{Error, ErrorKind};
use crate::core::table::{Cell, Table};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeepPolicy {
    First,
    Last,
}

impl KeepPolicy {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        match raw {
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            other => Err(Error::new(ErrorKind::Usage)
                .with_message(format!("invalid keep policy: {other}"))
                .with_hint("Use \"first\" or \"last\".")),
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct DedupeSummary {
    pub original_count: usize,
    pub duplicates_removed: usize,
    pub final_count: usize,
}

/// Remove duplicate rows in place and persist over the source file.
/// The dedupe column is normalized to trimmed strings before comparison and
/// the normalized values are what get written back.
pub fn deduplicate_csv(
    path: &Path,
    dedupe_column: &str,
    keep: KeepPolicy,
) -> Result<DedupeSummary, Error> {
    let mut table = Table::load(path)?;
    let original_count = table.len();

    if let Some(index) = table.column_index(dedupe_column) {
        normalize_key_column(&mut table, index);
        match keep {
            KeepPolicy::First => drop_duplicates_keep_first(&mut table, index),
            KeepPolicy::Last => drop_duplicates_keep_last(&mut table, index),
        }
    }

    let final_count = table.len();
    table.save(path)?;
    Ok(DedupeSummary {
        original_count,
        duplicates_removed: original_count - final_count,
        final_count,
    })
}

pub(crate) fn dedupe_key(cell: &Cell) -> String {
    cell.display_string().unwrap_or_default()
}

pub(crate) fn normalize_key_column(table: &mut Table, index: usize) {
    for row in &mut table.rows {
        row[index] = match &row[index] {
            Cell::Null => Cell::Null,
            Cell::Text(text) => Cell::Text(text.trim().to_string()),
            Cell::Number(number) => Cell::Text(format!("{number}")),
        };
    }
}

pub(crate) fn drop_duplicates_keep_first(table: &mut Table, index: usize) {
    let mut seen = HashSet::new();
    table.retain_rows(|row| seen.insert(dedupe_key(&row[index])));
}

pub(crate) fn drop_duplicates_keep_last(table: &mut Table, index: usize) {
    let mut last_position = HashMap::new();
    for (position, row) in table.rows.iter().enumerate() {
        last_position.insert(dedupe_key(&row[index]), position);
    }
    let mut position = 0;
    table.retain_rows(|row| {
        let keep = last_position[&dedupe_key(&row[index])] == position;
        position += 1;
        keep
    });
}
