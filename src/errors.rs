/// Domain-specific error types for querybench
///
/// Only failures that must stop the whole run surface as `BenchError`.
/// Anything recoverable at (row, variant) granularity is folded into a
/// result record by the pipeline instead.

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        field: Option<String>,
    },

    #[error("Input error: {0}")]
    Input(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Search engine unreachable: {0}")]
    Connection(String),

    #[error("Query construction error: {0}")]
    Query(String),
}

impl From<csv::Error> for BenchError {
    fn from(e: csv::Error) -> Self {
        BenchError::Output(e.to_string())
    }
}

impl From<crate::benchmark::query::QueryError> for BenchError {
    fn from(e: crate::benchmark::query::QueryError) -> Self {
        BenchError::Query(e.to_string())
    }
}

impl BenchError {
    /// Helper to create configuration errors tied to a field name
    ///
    /// Example:
    /// ```
    /// use querybench::errors::BenchError;
    /// let err = BenchError::config("match_phrase_slop", "must not be empty");
    /// assert!(err.to_string().contains("must not be empty"));
    /// ```
    pub fn config(field: &str, message: &str) -> Self {
        BenchError::Config {
            message: format!("{}: {}", field, message),
            field: Some(field.to_string()),
        }
    }
}
