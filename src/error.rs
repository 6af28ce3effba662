// 🚨 Error Taxonomy
// Fatal conditions stop a run before the archive is touched.
//
// Not errors:
// - rows without id/name/faction are dropped (counted in IngestReport)
// - an unchanged snapshot is an AppendOutcome::Unchanged, not a failure

use thiserror::Error;

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// A required table is absent or has no parseable header
    #[error("malformed input in {table}: {reason}")]
    MalformedInput { table: String, reason: String },

    /// One or more snapshot periods required downstream do not exist
    #[error("missing snapshot periods: {}", format_periods(.missing))]
    MissingPeriod { missing: Vec<u32> },

    /// An append tried to skip or rewrite a period index
    #[error("non-contiguous append: expected period {expected}, found {found}")]
    NonContiguousAppend { expected: u32, found: u32 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl LedgerError {
    pub fn malformed(table: &str, reason: impl Into<String>) -> Self {
        LedgerError::MalformedInput {
            table: table.to_string(),
            reason: reason.into(),
        }
    }
}

fn format_periods(periods: &[u32]) -> String {
    periods
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
