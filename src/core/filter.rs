//! Purpose: Multi-predicate filtering over a prospect table.
//! Exports: `FilterOptions`, `filter_profiles`; `apply_filter` for export.
//! Role: The shared predicate pipeline; export reuses it with a narrower surface.
//! Invariants: Supplied predicates AND together; unsupplied ones impose nothing.
//! Invariants: Null cells fail every predicate they are tested against.

use std::path::Path;

use serde_json::{Map, Value};

use crate::core::error::{Error, ErrorKind};
use crate::core::table::{
    self, COMPANY_COLUMN, CURRENT_ROLE_COLUMN, Cell, FOUND_DATE_COLUMN, LOCATION_COLUMN, Table,
};

#[derive(Clone, Debug, Default)]
pub struct FilterOptions {
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub locations: Vec<String>,
    pub companies: Vec<String>,
    pub current_role_only: bool,
    pub found_after_date: Option<String>,
    pub limit: Option<usize>,
}

/// Filter the table at `path` and return matching rows as JSON records,
/// best score first. A missing file is an empty result, not an error.
pub fn filter_profiles(
    path: &Path,
    options: &FilterOptions,
) -> Result<Vec<Map<String, Value>>, Error> {
    let Some(mut table) = Table::load_optional(path)? else {
        return Ok(Vec::new());
    };
    apply_filter(&mut table, options)?;
    Ok(table.records())
}

pub(crate) fn apply_filter(table: &mut Table, options: &FilterOptions) -> Result<(), Error> {
    let score_index = table.coerce_score_column();

    if options.min_score.is_some() || options.max_score.is_some() {
        let min = options.min_score.unwrap_or(f64::NEG_INFINITY);
        let max = options.max_score.unwrap_or(f64::INFINITY);
        table.retain_rows(|row| {
            score_index
                .and_then(|index| row[index].as_score())
                .is_some_and(|score| score >= min && score <= max)
        });
    }

    if !options.locations.is_empty() {
        retain_substring_match(table, LOCATION_COLUMN, &options.locations);
    }
    if !options.companies.is_empty() {
        retain_substring_match(table, COMPANY_COLUMN, &options.companies);
    }

    if options.current_role_only {
        let index = table.column_index(CURRENT_ROLE_COLUMN);
        table.retain_rows(|row| {
            index
                .and_then(|index| row[index].as_text())
                .is_some_and(|text| text.starts_with("YES"))
        });
    }

    if let Some(raw) = options.found_after_date.as_deref() {
        let after = table::parse_date(raw).ok_or_else(|| {
            Error::new(ErrorKind::Usage)
                .with_message(format!("invalid found_after_date: {raw}"))
                .with_hint("Use an ISO date such as 2026-02-16.")
        })?;
        let index = table.column_index(FOUND_DATE_COLUMN);
        table.retain_rows(|row| {
            index
                .and_then(|index| row[index].display_string())
                .and_then(|text| table::parse_date(&text))
                .is_some_and(|date| date > after)
        });
        // Every surviving row parsed; normalize to YYYY-MM-DD for output.
        if let Some(index) = index {
            normalize_date_column(table, index);
        }
    }

    table.sort_by_score_desc();
    if let Some(limit) = options.limit {
        table.truncate(limit);
    }
    Ok(())
}

/// Case-insensitive ANY-of substring match against one column. A missing
/// column or null cell matches nothing.
fn retain_substring_match(table: &mut Table, column: &str, needles: &[String]) {
    let index = table.column_index(column);
    let needles = needles
        .iter()
        .map(|needle| needle.to_lowercase())
        .collect::<Vec<_>>();
    table.retain_rows(|row| {
        index
            .and_then(|index| row[index].display_string())
            .is_some_and(|text| {
                let haystack = text.to_lowercase();
                needles.iter().any(|needle| haystack.contains(needle))
            })
    });
}

fn normalize_date_column(table: &mut Table, index: usize) {
    for row in &mut table.rows {
        if let Some(date) = row[index]
            .display_string()
            .and_then(|text| table::parse_date(&text))
        {
            row[index] = Cell::Text(table::format_date(date));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
LinkedIn URL,v2 Score,Location,Company,CURRENT Role Mention,Found Date
https://a,22,\"Berlin, Germany\",Acme,YES - platform lead,2026-02-01
https://b,18,\"Munich, Germany\",Globex,NO,2026-01-15
https://c,9,\"Austin, TX\",Initech,YES,2026-02-10
https://d,,\"Berlin, Germany\",Hooli,NO,not-a-date
";

    fn sample_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("prospects.csv");
        std::fs::write(&path, SAMPLE).expect("write sample");
        path
    }

    #[test]
    fn min_score_bound_is_inclusive_and_null_safe() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let options = FilterOptions {
            min_score: Some(18.0),
            ..FilterOptions::default()
        };
        let records = filter_profiles(&path, &options).expect("filter");
        assert_eq!(records.len(), 2);
        for record in &records {
            let score = record["v2 Score"].as_f64().expect("score");
            assert!(score >= 18.0);
        }
    }

    #[test]
    fn results_sort_score_descending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let records =
            filter_profiles(&path, &FilterOptions::default()).expect("filter");
        let scores = records
            .iter()
            .map(|record| record["v2 Score"].as_f64())
            .collect::<Vec<_>>();
        assert_eq!(scores[0], Some(22.0));
        assert_eq!(scores[1], Some(18.0));
        assert_eq!(scores[2], Some(9.0));
        // Null score renders as "" and sorts last.
        assert_eq!(records[3]["v2 Score"], Value::String(String::new()));
    }

    #[test]
    fn location_match_is_case_insensitive_substring() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let options = FilterOptions {
            locations: vec!["berlin".to_string()],
            ..FilterOptions::default()
        };
        let records = filter_profiles(&path, &options).expect("filter");
        assert_eq!(records.len(), 2);
        for record in &records {
            let location = record["Location"].as_str().expect("location");
            assert!(location.to_lowercase().contains("berlin"));
        }
    }

    #[test]
    fn predicates_compose_with_and() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let options = FilterOptions {
            min_score: Some(10.0),
            locations: vec!["germany".to_string()],
            current_role_only: true,
            ..FilterOptions::default()
        };
        let records = filter_profiles(&path, &options).expect("filter");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["LinkedIn URL"], "https://a");
    }

    #[test]
    fn current_role_only_requires_yes_prefix() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let options = FilterOptions {
            current_role_only: true,
            ..FilterOptions::default()
        };
        let records = filter_profiles(&path, &options).expect("filter");
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn found_after_excludes_unparseable_dates_and_normalizes_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let options = FilterOptions {
            found_after_date: Some("2026-01-20".to_string()),
            ..FilterOptions::default()
        };
        let records = filter_profiles(&path, &options).expect("filter");
        // `https://b` is before the threshold, `https://d` never parses.
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Found Date"], "2026-02-01");
        assert_eq!(records[1]["Found Date"], "2026-02-10");
    }

    #[test]
    fn invalid_found_after_date_is_a_usage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let options = FilterOptions {
            found_after_date: Some("last tuesday".to_string()),
            ..FilterOptions::default()
        };
        let err = filter_profiles(&path, &options).expect_err("bad date");
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[test]
    fn limit_truncates_after_sorting() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let options = FilterOptions {
            limit: Some(2),
            ..FilterOptions::default()
        };
        let records = filter_profiles(&path, &options).expect("filter");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["v2 Score"].as_f64(), Some(22.0));
    }

    #[test]
    fn score_bound_against_scoreless_table_matches_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plain.csv");
        std::fs::write(&path, "Company\nAcme\n").expect("write");
        let options = FilterOptions {
            min_score: Some(1.0),
            ..FilterOptions::default()
        };
        let records = filter_profiles(&path, &options).expect("filter");
        assert!(records.is_empty());
    }

    #[test]
    fn missing_file_is_an_empty_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.csv");
        let records =
            filter_profiles(&path, &FilterOptions::default()).expect("filter");
        assert!(records.is_empty());
    }
}
