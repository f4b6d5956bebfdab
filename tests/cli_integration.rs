// CLI integration tests for the core append/filter/search/stats/export/dedupe flows.
use std::path::Path;
use std::process::Command;

use serde_json::Value;

fn cmd() -> Command {
    let exe = env!("CARGO_BIN_EXE_prospector");
    Command::new(exe)
}

fn parse_json(value: &str) -> Value {
    serde_json::from_str(value).expect("valid json")
}

fn parse_json_lines(output: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(output)
        .lines()
        .map(parse_json)
        .collect()
}

fn seed(csv: &Path) {
    let batch = r#"[
        {"LinkedIn URL": "https://linkedin.com/in/a", "v2 Score": 22, "Location": "Berlin, Germany", "Company": "Acme", "CURRENT Role Mention": "YES - lead", "Found Date": "2026-02-01"},
        {"LinkedIn URL": "https://linkedin.com/in/b", "v2 Score": 18, "Location": "Munich, Germany", "Company": "Globex", "CURRENT Role Mention": "NO", "Found Date": "2026-01-15"},
        {"LinkedIn URL": "https://linkedin.com/in/c", "v2 Score": 9, "Location": "Austin, TX", "Company": "Initech", "CURRENT Role Mention": "YES", "Found Date": "2026-02-10"}
    ]"#;
    let append = cmd()
        .args(["append", csv.to_str().unwrap(), batch])
        .output()
        .expect("append");
    assert!(append.status.success());
}

#[test]
fn append_filter_flow() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("prospects.csv");
    seed(&csv);

    let filter = cmd()
        .args([
            "filter",
            csv.to_str().unwrap(),
            "--min-score",
            "15",
            "--location",
            "germany",
        ])
        .output()
        .expect("filter");
    assert!(filter.status.success());
    let rows = parse_json_lines(&filter.stdout);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["v2 Score"].as_f64(), Some(22.0));
    assert_eq!(rows[1]["v2 Score"].as_f64(), Some(18.0));
    for row in &rows {
        let location = row["Location"].as_str().expect("location");
        assert!(location.to_lowercase().contains("germany"));
    }
}

#[test]
fn append_is_idempotent_across_invocations() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("prospects.csv");
    let batch = r#"[{"LinkedIn URL": "https://a", "v2 Score": 10}, {"LinkedIn URL": "https://b", "v2 Score": 5}]"#;

    let first = cmd()
        .args(["append", csv.to_str().unwrap(), batch])
        .output()
        .expect("first append");
    assert!(first.status.success());
    let first_json = parse_json(std::str::from_utf8(&first.stdout).expect("utf8"));
    assert_eq!(first_json["added"], 2);
    assert_eq!(first_json["total_profiles"], 2);

    let second = cmd()
        .args(["append", csv.to_str().unwrap(), batch])
        .output()
        .expect("second append");
    assert!(second.status.success());
    let second_json = parse_json(std::str::from_utf8(&second.stdout).expect("utf8"));
    assert_eq!(second_json["added"], 0);
    assert_eq!(second_json["skipped_duplicates"], 2);
    assert_eq!(second_json["total_profiles"], 2);
}

#[test]
fn append_reads_profiles_from_stdin() {
    use std::io::Write;
    use std::process::Stdio;

    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("prospects.csv");

    let mut child = cmd()
        .args(["append", csv.to_str().unwrap()])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn");
    child
        .stdin
        .take()
        .expect("stdin")
        .write_all(br#"[{"LinkedIn URL": "https://a", "v2 Score": 7}]"#)
        .expect("write stdin");
    let output = child.wait_with_output().expect("wait");
    assert!(output.status.success());
    let json = parse_json(std::str::from_utf8(&output.stdout).expect("utf8"));
    assert_eq!(json["added"], 1);
}

#[test]
fn search_finds_company_terms_and_misses_absent_ones() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("prospects.csv");
    seed(&csv);

    let hit = cmd()
        .args(["search", csv.to_str().unwrap(), "globex"])
        .output()
        .expect("search");
    assert!(hit.status.success());
    let rows = parse_json_lines(&hit.stdout);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["Company"], "Globex");

    let miss = cmd()
        .args(["search", csv.to_str().unwrap(), "zzz-not-present"])
        .output()
        .expect("search");
    assert!(miss.status.success());
    assert!(miss.stdout.is_empty());
}

#[test]
fn stats_reports_counts_and_breakdowns() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("prospects.csv");
    seed(&csv);

    let stats = cmd()
        .args(["stats", csv.to_str().unwrap()])
        .output()
        .expect("stats");
    assert!(stats.status.success());
    let json = parse_json(std::str::from_utf8(&stats.stdout).expect("utf8"));
    assert_eq!(json["total_profiles"], 3);
    assert_eq!(json["score_distribution"]["20+"], 1);
    assert_eq!(json["score_distribution"]["15-19"], 1);
    assert_eq!(json["score_distribution"]["<10"], 1);
    assert_eq!(json["location_breakdown"]["Berlin, Germany"], 1);
    assert_eq!(json["current_role_count"], 2);
    assert_eq!(json["found_date_range"]["earliest"], "2026-01-15");
    assert_eq!(json["found_date_range"]["latest"], "2026-02-10");
}

#[test]
fn export_projects_columns_and_applies_threshold() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("prospects.csv");
    let segment = temp.path().join("segment.csv");
    seed(&csv);

    let export = cmd()
        .args([
            "export",
            csv.to_str().unwrap(),
            segment.to_str().unwrap(),
            "--min-score",
            "15",
            "--column",
            "LinkedIn URL",
            "--column",
            "v2 Score",
        ])
        .output()
        .expect("export");
    assert!(export.status.success());
    let json = parse_json(std::str::from_utf8(&export.stdout).expect("utf8"));
    assert_eq!(json["profiles_exported"], 2);
    assert_eq!(
        json["columns_included"],
        serde_json::json!(["LinkedIn URL", "v2 Score"])
    );

    let written = std::fs::read_to_string(&segment).expect("read segment");
    let mut lines = written.lines();
    assert_eq!(lines.next(), Some("LinkedIn URL,v2 Score"));
    for line in lines {
        let score: f64 = line.rsplit(',').next().expect("score").parse().expect("numeric");
        assert!(score >= 15.0);
    }
}

#[test]
fn dedupe_keep_first_removes_one_of_a_pair() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("prospects.csv");
    std::fs::write(
        &csv,
        "LinkedIn URL,Company\nhttps://a,Acme\nhttps://b,Globex\nhttps://a,Initech\n",
    )
    .expect("write");

    let dedupe = cmd()
        .args(["dedupe", csv.to_str().unwrap()])
        .output()
        .expect("dedupe");
    assert!(dedupe.status.success());
    let json = parse_json(std::str::from_utf8(&dedupe.stdout).expect("utf8"));
    assert_eq!(json["original_count"], 3);
    assert_eq!(json["duplicates_removed"], 1);
    assert_eq!(json["final_count"], 2);

    let contents = std::fs::read_to_string(&csv).expect("read back");
    assert!(contents.contains("https://a,Acme"));
    assert!(!contents.contains("Initech"));
}

#[test]
fn filter_on_missing_file_prints_nothing_and_succeeds() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("absent.csv");

    let filter = cmd()
        .args(["filter", csv.to_str().unwrap(), "--min-score", "1"])
        .output()
        .expect("filter");
    assert!(filter.status.success());
    assert!(filter.stdout.is_empty());
}

#[test]
fn stats_on_missing_file_exits_not_found_with_json_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("absent.csv");

    let stats = cmd()
        .args(["stats", csv.to_str().unwrap()])
        .output()
        .expect("stats");
    assert_eq!(stats.status.code(), Some(3));
    let err = parse_json(std::str::from_utf8(&stats.stderr).expect("utf8"));
    assert_eq!(err["error"]["kind"], "NotFound");
    assert_eq!(err["error"]["message"], "file not found");
}

#[test]
fn invalid_found_after_date_is_a_usage_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("prospects.csv");
    seed(&csv);

    let filter = cmd()
        .args([
            "filter",
            csv.to_str().unwrap(),
            "--found-after",
            "not-a-date",
        ])
        .output()
        .expect("filter");
    assert_eq!(filter.status.code(), Some(2));
    let err = parse_json(std::str::from_utf8(&filter.stderr).expect("utf8"));
    assert_eq!(err["error"]["kind"], "Usage");
}

#[test]
fn corrupt_csv_aborts_append_without_writing() {
    let temp = tempfile::tempdir().expect("tempdir");
    let csv = temp.path().join("prospects.csv");
    let ragged = "LinkedIn URL,Company\nhttps://a,Acme,extra\n";
    std::fs::write(&csv, ragged).expect("write");

    let append = cmd()
        .args([
            "append",
            csv.to_str().unwrap(),
            r#"[{"LinkedIn URL": "https://b"}]"#,
        ])
        .output()
        .expect("append");
    assert_eq!(append.status.code(), Some(4));
    let contents = std::fs::read_to_string(&csv).expect("read back");
    assert_eq!(contents, ragged);
}

#[test]
fn version_emits_json_when_piped() {
    let version = cmd().arg("version").output().expect("version");
    assert!(version.status.success());
    let json = parse_json(std::str::from_utf8(&version.stdout).expect("utf8"));
    assert_eq!(json["name"], "prospector");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}
