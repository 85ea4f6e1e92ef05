//! Error taxonomy for the aggregation engine.
//!
//! Load-time failures are either fatal for the whole source (missing
//! columns, unreadable input) or scoped to a single row. Row-scoped
//! failures are wrapped in [`RowError`] and collected by the loader.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Errors produced by loading and aggregating order records.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One or more required columns are absent from the header row.
    #[error("missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// A cell could not be coerced to its declared type.
    #[error("cannot parse {column} value {value:?}: {reason}")]
    Parse {
        column: String,
        value: String,
        reason: String,
    },

    /// A bounded value fell outside every declared bin.
    #[error("value {value} is outside the declared range [{lower}, {upper})")]
    OutOfRange { value: i64, lower: i64, upper: i64 },

    /// Malformed CSV structure (unterminated quote, bad UTF-8, ...).
    #[error("malformed CSV record: {0}")]
    Csv(#[from] csv::Error),

    /// Failure reading the source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Convenience constructor for [`EngineError::Parse`].
    pub fn parse(column: &str, value: &str, reason: impl Into<String>) -> Self {
        EngineError::Parse {
            column: column.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Schema { .. } => "schema",
            EngineError::Parse { .. } => "parse",
            EngineError::OutOfRange { .. } => "out_of_range",
            EngineError::Csv(_) => "csv",
            EngineError::Io(_) => "io",
        }
    }
}

/// A rejected input row: the 1-indexed source line plus the reason.
#[derive(Debug)]
pub struct RowError {
    /// Line number in the source file (header is line 1).
    pub line: u64,
    /// What went wrong with the row.
    pub error: EngineError,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.error)
    }
}

/// Serializable view of a [`RowError`] for reports.
#[derive(Debug, Clone, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub kind: String,
    pub message: String,
}

impl From<&RowError> for RejectedRow {
    fn from(row: &RowError) -> Self {
        Self {
            line: row.line,
            kind: row.error.kind().to_string(),
            message: row.error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_columns() {
        let err = EngineError::Schema {
            missing: vec!["Order Date".to_string(), "Quantity".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "missing required column(s): Order Date, Quantity"
        );
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn test_row_error_display() {
        let row = RowError {
            line: 7,
            error: EngineError::parse("Order Date", "31/02/2024", "invalid date"),
        };
        let text = row.to_string();
        assert!(text.starts_with("line 7:"));
        assert!(text.contains("Order Date"));

        let rejected = RejectedRow::from(&row);
        assert_eq!(rejected.line, 7);
        assert_eq!(rejected.kind, "parse");
    }
}
