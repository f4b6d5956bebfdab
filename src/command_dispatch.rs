//! Purpose: Hold top-level CLI command dispatch for `prospector`.
//! Exports: `dispatch_command`.
//! Role: Keep `main.rs` focused on parse/bootstrap and delegate command execution.
//! Invariants: Command behavior, output envelopes, and exit code semantics stay unchanged.
//! Invariants: Helpers in `main.rs` remain the source of output formatting.

use super::*;

pub(super) fn dispatch_command(command: Command) -> Result<RunOutcome, Error> {
    match command {
        Command::Completion { shell } => {
            let mut cmd = Cli::command();
            clap_complete::aot::generate(shell, &mut cmd, "prospector", &mut io::stdout());
            Ok(RunOutcome::ok())
        }
        Command::Version => {
            emit_version_output();
            Ok(RunOutcome::ok())
        }
        Command::Mcp => {
            init_tracing();
            mcp_stdio::serve()?;
            Ok(RunOutcome::ok())
        }
        Command::Append {
            csv,
            profiles,
            file,
            dedupe_column,
        } => {
            let batch = read_profiles(profiles, file)?;
            let summary = append_profiles(&csv, &batch, &dedupe_column)?;
            emit_json(to_json_value(summary)?);
            Ok(RunOutcome::ok())
        }
        Command::Filter {
            csv,
            min_score,
            max_score,
            locations,
            companies,
            current_role_only,
            found_after,
            limit,
        } => {
            let options = FilterOptions {
                min_score,
                max_score,
                locations,
                companies,
                current_role_only,
                found_after_date: found_after,
                limit,
            };
            let records = filter_profiles(&csv, &options)?;
            emit_records(records);
            Ok(RunOutcome::ok())
        }
        Command::Search {
            csv,
            term,
            columns,
            case_sensitive,
            limit,
        } => {
            let options = SearchOptions {
                columns: if columns.is_empty() {
                    None
                } else {
                    Some(columns)
                },
                case_sensitive,
                limit,
            };
            let records = search_profiles(&csv, &term, &options)?;
            emit_records(records);
            Ok(RunOutcome::ok())
        }
        Command::Stats { csv, json } => {
            let stats = csv_stats(&csv)?;
            if json || !io::stdout().is_terminal() {
                emit_json(to_json_value(stats)?);
            } else {
                emit_stats_human(&stats);
            }
            Ok(RunOutcome::ok())
        }
        Command::Export {
            source,
            output,
            min_score,
            locations,
            companies,
            columns,
        } => {
            let options = ExportOptions {
                min_score,
                locations,
                companies,
                columns: if columns.is_empty() {
                    None
                } else {
                    Some(columns)
                },
            };
            let summary = export_segment(&source, &output, &options)?;
            emit_json(to_json_value(summary)?);
            Ok(RunOutcome::ok())
        }
        Command::Dedupe { csv, column, keep } => {
            let summary = deduplicate_csv(&csv, &column, keep.into())?;
            emit_json(to_json_value(summary)?);
            Ok(RunOutcome::ok())
        }
    }
}
