pub mod executor;
pub mod schema;

use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum DbError {
    /// The database file is missing or could not be opened.
    Open(String),
    /// The statement failed to prepare, run, commit, or materialize.
    Execution(String),
}

// Display is the bare engine message; callers add their own prefix
impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Open(msg) => write!(f, "{}", msg),
            DbError::Execution(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for DbError {}

impl From<duckdb::Error> for DbError {
    fn from(err: duckdb::Error) -> Self {
        DbError::Execution(err.to_string())
    }
}

impl From<arrow::error::ArrowError> for DbError {
    fn from(err: arrow::error::ArrowError) -> Self {
        DbError::Execution(err.to_string())
    }
}
