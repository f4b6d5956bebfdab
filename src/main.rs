//! Purpose: `prospector` CLI entry point and command definitions.
//! Role: Binary crate root; parses args, runs commands, emits JSON on stdout.
//! Invariants: Commands emit stable stdout formats (human or JSON by command/flags).
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `core::to_exit_code`.

use std::error::Error as StdError;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{
    CommandFactory, Parser, Subcommand, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use clap_complete::aot::Shell;
use serde_json::{Map, Value, json};

mod command_dispatch;
mod mcp_stdio;

use prospector::core::{
    CsvStats, Error, ErrorKind, ExportOptions, FilterOptions, KeepPolicy, SearchOptions,
    append_profiles, csv_stats, deduplicate_csv, export_segment, filter_profiles,
    search_profiles, to_exit_code,
};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err(err) => {
            emit_error(&err);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, Error> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp
            | ClapErrorKind::DisplayVersion
            | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                err.print().map_err(|io_err| {
                    Error::new(ErrorKind::Io)
                        .with_message("failed to write help")
                        .with_source(io_err)
                })?;
                let exit_code = if matches!(
                    err.kind(),
                    ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
                ) {
                    2
                } else {
                    0
                };
                return Ok(RunOutcome::with_code(exit_code));
            }
            _ => {
                return Err(Error::new(ErrorKind::Usage)
                    .with_message(clap_error_summary(&err))
                    .with_hint("Try `prospector --help`."));
            }
        },
    };

    command_dispatch::dispatch_command(cli.command)
        .map_err(add_missing_file_hint)
        .map_err(add_parse_hint)
}

#[derive(Parser)]
#[command(
    name = "prospector",
    version,
    about = "Prospect-table CSV engine with a CLI and an MCP stdio server",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

COMMANDS
{subcommands}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"One CSV file per dataset; the header row names the columns.
Every command loads the whole table, applies one operation, and either
prints rows/JSON or writes the result back.
"#,
    after_help = r#"EXAMPLES
  $ prospector append prospects.csv '[{"LinkedIn URL":"https://...","v2 Score":21}]'
  $ prospector filter prospects.csv --min-score 15 --location Berlin
  $ prospector stats prospects.csv
  $ prospector mcp                     # serve the operations over MCP stdio

LEARN MORE
  $ prospector <command> --help"#,
    arg_required_else_help = true,
    disable_help_subcommand = false
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KeepCli {
    First,
    Last,
}

impl From<KeepCli> for KeepPolicy {
    fn from(value: KeepCli) -> Self {
        match value {
            KeepCli::First => KeepPolicy::First,
            KeepCli::Last => KeepPolicy::Last,
        }
    }
}

#[derive(Subcommand)]
enum Command {
    #[command(
        arg_required_else_help = true,
        about = "Append profiles to a CSV with automatic deduplication",
        long_about = r#"Append a batch of profile records to a CSV.

Rows whose dedupe-column value already occurs are skipped: existing rows
always win, and within the batch the first occurrence wins. The existing
file's column order is authoritative for what gets persisted."#,
        after_help = r#"EXAMPLES
  $ prospector append prospects.csv '[{"LinkedIn URL":"https://...","v2 Score":21}]'
  $ prospector append prospects.csv --file batch.json
  $ curl -s https://api.example.com/batch | prospector append prospects.csv

NOTES
  - PROFILES is a JSON array of objects; use --file or pipe stdin for batches
  - Appending the same batch twice reports added=0 the second time"#
    )]
    Append {
        #[arg(help = "CSV file to append to", value_hint = ValueHint::FilePath)]
        csv: PathBuf,
        #[arg(help = "Inline JSON array of profile objects")]
        profiles: Option<String>,
        #[arg(
            short = 'f',
            long = "file",
            help = "Read the JSON array from a file (use - for stdin)",
            conflicts_with = "profiles",
            value_hint = ValueHint::FilePath
        )]
        file: Option<PathBuf>,
        #[arg(
            long,
            default_value = "LinkedIn URL",
            help = "Column name to use for deduplication"
        )]
        dedupe_column: String,
    },
    #[command(
        arg_required_else_help = true,
        about = "Filter profiles by score, location, company, role, and date",
        long_about = r#"Filter the table by any combination of criteria.

All supplied criteria must hold (logical AND). Results are sorted by
score, best first, and printed as JSON Lines."#,
        after_help = r#"EXAMPLES
  $ prospector filter prospects.csv --min-score 15
  $ prospector filter prospects.csv --location Berlin --location Munich
  $ prospector filter prospects.csv --current-role-only --found-after 2026-01-01
  $ prospector filter prospects.csv --min-score 18 --limit 10 | jq '."LinkedIn URL"'

NOTES
  - --location/--company repeat; a row matches if ANY value is a
    case-insensitive substring
  - A missing CSV prints nothing (empty result, exit 0)"#
    )]
    Filter {
        #[arg(help = "CSV file to read", value_hint = ValueHint::FilePath)]
        csv: PathBuf,
        #[arg(long, help = "Keep rows with score >= N")]
        min_score: Option<f64>,
        #[arg(long, help = "Keep rows with score <= N")]
        max_score: Option<f64>,
        #[arg(
            long = "location",
            value_name = "SUBSTR",
            help = "Location substring (repeatable; OR across repeats)"
        )]
        locations: Vec<String>,
        #[arg(
            long = "company",
            value_name = "SUBSTR",
            help = "Company substring (repeatable; OR across repeats)"
        )]
        companies: Vec<String>,
        #[arg(long, help = "Keep only rows whose role mention starts with YES")]
        current_role_only: bool,
        #[arg(
            long = "found-after",
            value_name = "DATE",
            help = "Keep rows found strictly after this ISO date"
        )]
        found_after: Option<String>,
        #[arg(short = 'n', long, help = "Cap the result count after sorting")]
        limit: Option<usize>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Search for a literal substring across text columns",
        long_about = r#"Search for profiles containing a literal substring.

Searches Headline, Company, Match Reason, and CURRENT Role Mention by
default; pass --column to search elsewhere. No regex interpretation."#,
        after_help = r#"EXAMPLES
  $ prospector search prospects.csv fintech
  $ prospector search prospects.csv Globex --column Company
  $ prospector search prospects.csv SQL --case-sensitive --limit 5"#
    )]
    Search {
        #[arg(help = "CSV file to read", value_hint = ValueHint::FilePath)]
        csv: PathBuf,
        #[arg(help = "Substring to search for")]
        term: String,
        #[arg(
            long = "column",
            value_name = "NAME",
            help = "Column to search (repeatable; replaces the default set)"
        )]
        columns: Vec<String>,
        #[arg(long, help = "Match case-sensitively")]
        case_sensitive: bool,
        #[arg(short = 'n', long, help = "Cap the result count after sorting")]
        limit: Option<usize>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Summarize the table: bands, breakdowns, date range",
        after_help = r#"EXAMPLES
  $ prospector stats prospects.csv
  $ prospector stats prospects.csv --json

NOTES
  - Human-readable output on a terminal; JSON otherwise or with --json"#
    )]
    Stats {
        #[arg(help = "CSV file to read", value_hint = ValueHint::FilePath)]
        csv: PathBuf,
        #[arg(long, help = "Emit JSON instead of human-readable output")]
        json: bool,
    },
    #[command(
        arg_required_else_help = true,
        about = "Export a filtered segment to a new CSV",
        long_about = r#"Export rows matching the given criteria into a new CSV file.

The filter surface here is narrower than `filter`: min-score, locations,
and companies only. Requested output columns that do not exist are
silently dropped."#,
        after_help = r#"EXAMPLES
  $ prospector export prospects.csv berlin.csv --location Berlin
  $ prospector export prospects.csv top.csv --min-score 18 \
      --column "LinkedIn URL" --column "v2 Score"

NOTES
  - Zero matches report profiles_exported=0 and write nothing
  - The destination is overwritten when matches exist"#
    )]
    Export {
        #[arg(help = "Source CSV file", value_hint = ValueHint::FilePath)]
        source: PathBuf,
        #[arg(help = "Destination CSV file", value_hint = ValueHint::FilePath)]
        output: PathBuf,
        #[arg(long, help = "Keep rows with score >= N")]
        min_score: Option<f64>,
        #[arg(
            long = "location",
            value_name = "SUBSTR",
            help = "Location substring (repeatable; OR across repeats)"
        )]
        locations: Vec<String>,
        #[arg(
            long = "company",
            value_name = "SUBSTR",
            help = "Company substring (repeatable; OR across repeats)"
        )]
        companies: Vec<String>,
        #[arg(
            long = "column",
            value_name = "NAME",
            help = "Output column (repeatable; default: all columns)"
        )]
        columns: Vec<String>,
    },
    #[command(
        arg_required_else_help = true,
        about = "Remove duplicate rows from a CSV (maintenance)",
        after_help = r#"EXAMPLES
  $ prospector dedupe prospects.csv
  $ prospector dedupe prospects.csv --column Email --keep last

NOTES
  - Keys are trimmed before comparison; the file is rewritten in place"#
    )]
    Dedupe {
        #[arg(help = "CSV file to deduplicate", value_hint = ValueHint::FilePath)]
        csv: PathBuf,
        #[arg(
            long,
            default_value = "LinkedIn URL",
            help = "Column name to use for deduplication"
        )]
        column: String,
        #[arg(
            long,
            value_enum,
            default_value = "first",
            help = "Which occurrence of a duplicate group survives"
        )]
        keep: KeepCli,
    },
    #[command(
        about = "Serve the operations as MCP tools over stdio",
        long_about = r#"Run an MCP server on stdin/stdout.

Exposes all six operations as tools over newline-delimited JSON-RPC.
Logs go to stderr (RUST_LOG controls verbosity); stdout carries only
JSON-RPC messages."#,
        after_help = r#"EXAMPLES
  $ prospector mcp
  $ RUST_LOG=debug prospector mcp"#
    )]
    Mcp,
    #[command(
        about = "Print version info as JSON",
        after_help = r#"EXAMPLES
  $ prospector version"#
    )]
    Version,
    #[command(
        arg_required_else_help = true,
        about = "Generate shell completions",
        after_help = r#"EXAMPLES
  $ prospector completion bash > ~/.local/share/bash-completion/completions/prospector
  $ prospector completion zsh > ~/.zfunc/_prospector"#
    )]
    Completion {
        #[arg(help = "Shell to generate completions for")]
        shell: Shell,
    },
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn read_profiles(
    inline: Option<String>,
    file: Option<PathBuf>,
) -> Result<Vec<Map<String, Value>>, Error> {
    let text = if let Some(inline) = inline {
        inline
    } else if let Some(file) = file {
        if file.as_os_str() == "-" {
            read_stdin()?
        } else {
            std::fs::read_to_string(&file).map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("failed to read profiles file")
                    .with_path(&file)
                    .with_source(err)
            })?
        }
    } else if !io::stdin().is_terminal() {
        read_stdin()?
    } else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("no profiles provided")
            .with_hint("Pass a JSON array inline, use --file, or pipe stdin."));
    };
    parse_profiles(&text)
}

fn read_stdin() -> Result<String, Error> {
    let mut text = String::new();
    io::stdin().read_to_string(&mut text).map_err(|err| {
        Error::new(ErrorKind::Io)
            .with_message("failed to read profiles from stdin")
            .with_source(err)
    })?;
    Ok(text)
}

fn parse_profiles(text: &str) -> Result<Vec<Map<String, Value>>, Error> {
    let value: Value = serde_json::from_str(text).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("profiles are not valid JSON")
            .with_hint("Provide a JSON array of objects.")
            .with_source(err)
    })?;
    let Value::Array(items) = value else {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("profiles must be a JSON array of objects"));
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Object(object) => Ok(object),
            _ => Err(Error::new(ErrorKind::Usage)
                .with_message("profiles must be a JSON array of objects")),
        })
        .collect()
}

fn to_json_value<T: serde::Serialize>(value: T) -> Result<Value, Error> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Internal)
            .with_message("failed to encode result")
            .with_source(err)
    })
}

fn emit_version_output() {
    if io::stdout().is_terminal() {
        println!("prospector {}", env!("CARGO_PKG_VERSION"));
    } else {
        emit_json(json!({
            "name": "prospector",
            "version": env!("CARGO_PKG_VERSION"),
        }));
    }
}

fn emit_json(value: Value) {
    let json = if io::stdout().is_terminal() {
        serde_json::to_string_pretty(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    } else {
        serde_json::to_string(&value)
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string())
    };
    println!("{json}");
}

fn emit_records(records: Vec<Map<String, Value>>) {
    for record in records {
        let line = serde_json::to_string(&Value::Object(record))
            .unwrap_or_else(|_| "{\"error\":\"json encode failed\"}".to_string());
        println!("{line}");
    }
}

fn emit_stats_human(stats: &CsvStats) {
    println!("Profiles: {}", stats.total_profiles);
    println!("Average score: {}", stats.avg_score);
    if !stats.score_distribution.is_empty() {
        println!("Score bands:");
        for (band, count) in &stats.score_distribution {
            println!("  {band:<6} {count}");
        }
    }
    if !stats.location_breakdown.is_empty() {
        println!("Top locations:");
        for (location, count) in &stats.location_breakdown {
            println!("  {location:<28} {count}");
        }
    }
    if !stats.company_size_breakdown.is_empty() {
        println!("Company sizes:");
        for (size, count) in &stats.company_size_breakdown {
            println!("  {size:<28} {count}");
        }
    }
    if !stats.found_date_range.earliest.is_empty() {
        println!(
            "Found dates: {} to {}",
            stats.found_date_range.earliest, stats.found_date_range.latest
        );
    }
    println!("Current-role mentions: {}", stats.current_role_count);
}

fn add_missing_file_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::NotFound || err.hint().is_some() {
        return err;
    }
    err.with_hint("Check the CSV path, or create the file with `prospector append`.")
}

fn add_parse_hint(err: Error) -> Error {
    if err.kind() != ErrorKind::Parse || err.hint().is_some() {
        return err;
    }
    err.with_hint("The file is not valid CSV. No changes were written.")
}

fn emit_error(err: &Error) {
    if io::stderr().is_terminal() {
        eprintln!("{}", error_text(err));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::NotFound => "not found".to_string(),
        ErrorKind::Parse => "invalid tabular data".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error) -> String {
    let mut lines = Vec::new();
    lines.push(format!("error: {}", error_message(err)));
    if let Some(hint) = err.hint() {
        lines.push(format!("hint: {hint}"));
    }
    if let Some(path) = err.path() {
        lines.push(format!("path: {}", path.display()));
    }
    if let Some(cause) = error_causes(err).first() {
        lines.push(format!("caused by: {cause}"));
    }
    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}
