// Core modules implementing the table model, operations, and error modeling.
pub mod append;
pub mod dedupe;
pub mod error;
pub mod export;
pub mod filter;
pub mod search;
pub mod stats;
pub mod table;

pub use append::{AppendSummary, append_profiles};
pub use dedupe::{DedupeSummary, KeepPolicy, deduplicate_csv};
#[doc(hidden)]
pub use error::to_exit_code;
pub use error::{Error, ErrorKind};
pub use export::{ExportOptions, ExportSummary, export_segment};
pub use filter::{FilterOptions, filter_profiles};
pub use search::{SearchOptions, search_profiles};
pub use stats::{CsvStats, FoundDateRange, csv_stats};
pub use table::{Cell, Table};
