//! Error types for query-parser construction.
//!
//! Parsing itself never fails: ambiguity and missing information are reported
//! as [`Warning`](crate::types::Warning)s on the parsed query. [`QueryError`]
//! covers the operations that can genuinely fail, namely loading reference
//! tables and validating configuration.

use thiserror::Error;

/// Errors that can occur while loading reference tables or building a parser.
#[derive(Error, Debug)]
pub enum QueryError {
    /// A reference-table source failed to produce its tables.
    #[error("Table source {source_name} failed: {message}")]
    Source {
        /// Name of the failing source.
        source_name: String,
        /// Description of the failure.
        message: String,
    },

    /// Filesystem error while reading or writing table data.
    #[error("I/O error: {0}")]
    Io(String),

    /// Error decoding reference data.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An invalid parameter was provided.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl QueryError {
    /// Creates a [`QueryError::Source`] for the named source.
    pub fn source(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }
}

/// Result type alias using [`QueryError`].
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_error_display() {
        let err = QueryError::source("sqlite", "no such table: ticker_aliases");
        assert_eq!(
            err.to_string(),
            "Table source sqlite failed: no such table: ticker_aliases"
        );
    }

    #[test]
    fn test_invalid_parameter_display() {
        let err = QueryError::InvalidParameter("default_ticker is empty".to_string());
        assert_eq!(err.to_string(), "Invalid parameter: default_ticker is empty");
    }
}
