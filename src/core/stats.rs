//! Purpose: Aggregate statistics over a prospect table.
//! Exports: `csv_stats`, `CsvStats`, `FoundDateRange`.
//! Role: Read-only diagnostic; a missing file is an explicit error value.
//! Invariants: Score bands are disjoint, lower-inclusive, upper-exclusive.
//! Invariants: Null cells never contribute to averages, bands, or breakdowns.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::error::Error;
use crate::core::table::{
    self, COMPANY_SIZE_COLUMN, CURRENT_ROLE_COLUMN, FOUND_DATE_COLUMN, LOCATION_COLUMN,
    SCORE_COLUMN, Table,
};

const TOP_LOCATIONS: usize = 10;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CsvStats {
    pub total_profiles: usize,
    pub avg_score: f64,
    pub score_distribution: Map<String, Value>,
    pub location_breakdown: Map<String, Value>,
    pub company_size_breakdown: Map<String, Value>,
    pub found_date_range: FoundDateRange,
    pub current_role_count: usize,
}

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct FoundDateRange {
    pub earliest: String,
    pub latest: String,
}

pub fn csv_stats(path: &Path) -> Result<CsvStats, Error> {
    let table = Table::load(path)?;

    let (avg_score, score_distribution) = score_summary(&table);
    Ok(CsvStats {
        total_profiles: table.len(),
        avg_score,
        score_distribution,
        location_breakdown: value_counts(&table, LOCATION_COLUMN, Some(TOP_LOCATIONS)),
        company_size_breakdown: value_counts(&table, COMPANY_SIZE_COLUMN, None),
        found_date_range: found_date_range(&table),
        current_role_count: current_role_count(&table),
    })
}

fn score_summary(table: &Table) -> (f64, Map<String, Value>) {
    let Some(index) = table.column_index(SCORE_COLUMN) else {
        return (0.0, Map::new());
    };
    let scores = table
        .rows()
        .iter()
        .filter_map(|row| row[index].as_score())
        .collect::<Vec<_>>();

    let avg = if scores.is_empty() {
        0.0
    } else {
        round2(scores.iter().sum::<f64>() / scores.len() as f64)
    };

    let mut top = 0u64;
    let mut high = 0u64;
    let mut mid = 0u64;
    let mut low = 0u64;
    for score in &scores {
        if *score >= 20.0 {
            top += 1;
        } else if *score >= 15.0 {
            high += 1;
        } else if *score >= 10.0 {
            mid += 1;
        } else {
            low += 1;
        }
    }

    let mut distribution = Map::new();
    distribution.insert("20+".to_string(), Value::from(top));
    distribution.insert("15-19".to_string(), Value::from(high));
    distribution.insert("10-14".to_string(), Value::from(mid));
    distribution.insert("<10".to_string(), Value::from(low));
    (avg, distribution)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Distinct-value counts for one column, most frequent first; ties break by
/// first appearance in the table so output is deterministic.
fn value_counts(table: &Table, column: &str, top: Option<usize>) -> Map<String, Value> {
    let Some(index) = table.column_index(column) else {
        return Map::new();
    };
    let mut first_seen = Vec::new();
    let mut counts: HashMap<String, u64> = HashMap::new();
    for row in table.rows() {
        let Some(value) = row[index].display_string() else {
            continue;
        };
        if !counts.contains_key(&value) {
            first_seen.push(value.clone());
        }
        *counts.entry(value).or_insert(0) += 1;
    }

    let mut ranked = first_seen.into_iter().enumerate().collect::<Vec<_>>();
    ranked.sort_by(|(a_pos, a), (b_pos, b)| counts[b].cmp(&counts[a]).then(a_pos.cmp(b_pos)));

    let mut breakdown = Map::new();
    for (_, value) in ranked.into_iter().take(top.unwrap_or(usize::MAX)) {
        let count = counts[&value];
        breakdown.insert(value, Value::from(count));
    }
    breakdown
}

fn found_date_range(table: &Table) -> FoundDateRange {
    let Some(index) = table.column_index(FOUND_DATE_COLUMN) else {
        return FoundDateRange::default();
    };
    let mut earliest = None;
    let mut latest = None;
    for row in table.rows() {
        let Some(date) = row[index]
            .display_string()
            .and_then(|text| table::parse_date(&text))
        else {
            continue;
        };
        earliest = Some(earliest.map_or(date, |current| date.min(current)));
        latest = Some(latest.map_or(date, |current| date.max(current)));
    }
    match (earliest, latest) {
        (Some(earliest), Some(latest)) => FoundDateRange {
            earliest: table::format_date(earliest),
            latest: table::format_date(latest),
        },
        _ => FoundDateRange::default(),
    }
}

fn current_role_count(table: &Table) -> usize {
    let Some(index) = table.column_index(CURRENT_ROLE_COLUMN) else {
        return 0;
    };
    table
        .rows()
        .iter()
        .filter(|row| {
            row[index]
                .as_text()
                .is_some_and(|text| text.starts_with("YES"))
        })
        .count()
}
