//! Purpose: Append-with-dedupe, the one operation that mutates an existing table.
//! Exports: `append_profiles`, `AppendSummary`.
//! Role: Merge a batch of JSON records into the backing file under the
//! existing file's canonical column order.
//! Invariants: Pre-existing rows always win over new rows with the same key.
//! Invariants: An unparseable existing file aborts the append with no write.

use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::dedupe::{drop_duplicates_keep_first, normalize_key_column};
use crate::core::error::Error;
use crate::core::table::{Cell, Table};

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AppendSummary {
    pub added: usize,
    pub skipped_duplicates: usize,
    pub total_profiles: usize,
}

/// Append `profiles` to the table at `path`, dropping rows whose dedupe key
/// already occurs earlier (existing rows first, then earlier batch entries).
///
/// The existing file's column order is authoritative: new-record columns the
/// file lacks are dropped on persist, file columns a record lacks become null.
/// When the file does not exist, the batch's first-appearance key order
/// becomes the canonical column order.
pub fn append_profiles(
    path: &Path,
    profiles: &[Map<String, Value>],
    dedupe_column: &str,
) -> Result<AppendSummary, Error> {
    let existing = Table::load_optional(path)?;
    let pre_existing_count = existing.as_ref().map_or(0, Table::len);

    let mut combined_columns = existing
        .as_ref()
        .map(|table| table.columns().to_vec())
        .unwrap_or_default();
    for profile in profiles {
        for key in profile.keys() {
            if !combined_columns.iter().any(|column| column == key) {
                combined_columns.push(key.clone());
            }
        }
    }
    let canonical_columns = match &existing {
        Some(table) => table.columns().to_vec(),
        None => combined_columns.clone(),
    };

    if combined_columns.is_empty() {
        // Nothing to persist: no existing table and a batch with no columns.
        return Ok(AppendSummary {
            added: 0,
            skipped_duplicates: profiles.len(),
            total_profiles: 0,
        });
    }

    let width = combined_columns.len();
    let mut combined = Table::new(combined_columns.clone());
    if let Some(existing) = existing {
        for mut row in existing.rows {
            row.resize(width, Cell::Null);
            combined.push_row(row);
        }
    }
    for profile in profiles {
        let row = combined_columns
            .iter()
            .map(|column| {
                profile
                    .get(column)
                    .map(Cell::from_json)
                    .unwrap_or(Cell::Null)
            })
            .collect();
        combined.push_row(row);
    }

    if let Some(index) = combined.column_index(dedupe_column) {
        normalize_key_column(&mut combined, index);
        drop_duplicates_keep_first(&mut combined, index);
    }

    let total_profiles = combined.len();
    let added = total_profiles - pre_existing_count;
    let skipped_duplicates = profiles.len().saturating_sub(added);

    combined.reindex(&canonical_columns).save(path)?;
    Ok(AppendSummary {
        added,
        skipped_duplicates,
        total_profiles,
    })
}
