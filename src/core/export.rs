// Filtered export into a new table file. The filter surface here is
// deliberately narrower than `filter_profiles`: only min_score, locations,
// and companies reach the predicate pipeline.
use std::path::{self, Path};

use serde::Serialize;

use crate::core::error::{Error, ErrorKind};
use crate::core::filter::{FilterOptions, apply_filter};
use crate::core::table::Table;

#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    pub min_score: Option<f64>,
    pub locations: Vec<String>,
    pub companies: Vec<String>,
    /// Optional projection; requested columns not present are silently dropped.
    pub columns: Option<Vec<String>>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ExportSummary {
    pub profiles_exported: usize,
    pub output_path: String,
    pub columns_included: Vec<String>,
}

/// Export matching rows from `source` into `output`, overwriting it.
/// Zero matches report a summary without touching the destination.
pub fn export_segment(
    source: &Path,
    output: &Path,
    options: &ExportOptions,
) -> Result<ExportSummary, Error> {
    let criteria = FilterOptions {
        min_score: options.min_score,
        locations: options.locations.clone(),
        companies: options.companies.clone(),
        ..FilterOptions::default()
    };
    let mut table = Table::load_optional(source)?.unwrap_or_default();
    apply_filter(&mut table, &criteria)?;

    if table.is_empty() {
        return empty_summary(output);
    }

    let table = match options.columns.as_deref() {
        Some(requested) => {
            let present = requested
                .iter()
                .filter(|column| table.column_index(column).is_some())
                .cloned()
                .collect::<Vec<_>>();
            if present.is_empty() {
                return empty_summary(output);
            }
            table.reindex(&present)
        }
        None => table,
    };

    table.save(output)?;
    Ok(ExportSummary {
        profiles_exported: table.len(),
        output_path: absolute_display(output)?,
        columns_included: table.columns().to_vec(),
    })
}

fn empty_summary(output: &Path) -> Result<ExportSummary, Error> {
    Ok(ExportSummary {
        profiles_exported: 0,
        output_path: absolute_display(output)?,
        columns_included: Vec::new(),
    })
}

fn absolute_display(path: &Path) -> Result<String, Error> {
    path::absolute(path)
        .map(|absolute| absolute.display().to_string())
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to resolve output path")
                .with_path(path)
                .with_source(err)
        })
}
