// Literal substring search across a configurable set of text columns.
use std::path::Path;

use serde_json::{Map, Value};

use crate::core::error::Error;
use crate::core::table::{DEFAULT_SEARCH_COLUMNS, Table};

#[derive(Clone, Debug, Default)]
pub struct SearchOptions {
    /// Columns to search; defaults to headline/company/match-reason/current-role,
    /// restricted to columns actually present.
    pub columns: Option<Vec<String>>,
    pub case_sensitive: bool,
    pub limit: Option<usize>,
}

/// Return rows where `search_term` occurs as a literal substring in ANY of
/// the searched columns, best score first. Null cells never match; a missing
/// file is an empty result.
pub fn search_profiles(
    path: &Path,
    search_term: &str,
    options: &SearchOptions,
) -> Result<Vec<Map<String, Value>>, Error> {
    let Some(mut table) = Table::load_optional(path)? else {
        return Ok(Vec::new());
    };

    let requested = options.columns.clone().unwrap_or_else(|| {
        DEFAULT_SEARCH_COLUMNS
            .iter()
            .map(|column| column.to_string())
            .collect()
    });
    let indices = requested
        .iter()
        .filter_map(|column| table.column_index(column))
        .collect::<Vec<_>>();

    let case_sensitive = options.case_sensitive;
    let needle = if case_sensitive {
        search_term.to_string()
    } else {
        search_term.to_lowercase()
    };
    table.retain_rows(|row| {
        indices.iter().any(|&index| {
            row[index].display_string().is_some_and(|text| {
                if case_sensitive {
                    text.contains(&needle)
                } else {
                    text.to_lowercase().contains(&needle)
                }
            })
        })
    });

    table.coerce_score_column();
    table.sort_by_score_desc();
    if let Some(limit) = options.limit {
        table.truncate(limit);
    }
    Ok(table.records())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
LinkedIn URL,v2 Score,Headline,Company,Match Reason
https://a,12,Platform engineering lead,Acme Robotics,Mentions platform team
https://b,20,Data analyst,Globex,Strong SQL background
https://c,7,Engineering manager,Initech,Career switcher
";

    fn sample_path(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("prospects.csv");
        std::fs::write(&path, SAMPLE).expect("write sample");
        path
    }

    #[test]
    fn term_present_in_company_matches() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let records =
            search_profiles(&path, "globex", &SearchOptions::default()).expect("search");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["LinkedIn URL"], "https://b");
    }

    #[test]
    fn term_absent_from_searched_columns_matches_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        // Present only in the unsearched URL column.
        let records =
            search_profiles(&path, "https://", &SearchOptions::default()).expect("search");
        assert!(records.is_empty());
    }

    #[test]
    fn matches_order_by_score_descending() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let records =
            search_profiles(&path, "engineering", &SearchOptions::default()).expect("search");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["v2 Score"].as_f64(), Some(12.0));
        assert_eq!(records[1]["v2 Score"].as_f64(), Some(7.0));
    }

    #[test]
    fn case_sensitive_flag_disables_folding() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let options = SearchOptions {
            case_sensitive: true,
            ..SearchOptions::default()
        };
        let records = search_profiles(&path, "globex", &options).expect("search");
        assert!(records.is_empty());
    }

    #[test]
    fn explicit_columns_restrict_the_match_and_absent_ones_are_ignored() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = sample_path(&dir);
        let options = SearchOptions {
            columns: Some(vec!["Headline".to_string(), "No Such Column".to_string()]),
            ..SearchOptions::default()
        };
        let records = search_profiles(&path, "sql", &options).expect("search");
        assert!(records.is_empty());

        let records = search_profiles(&path, "analyst", &options).expect("search");
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn missing_file_is_an_empty_result() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("absent.csv");
        let records =
            search_profiles(&path, "anything", &SearchOptions::default()).expect("search");
        assert!(records.is_empty());
    }
}
