use crate::db::executor::{self, ResultSet};
use crate::db::DbError;
use crate::llm::{LlmError, LlmManager};
use crate::prompt::{is_bare_output, refused_table, STUDENT_PROMPT};
use crate::session::SessionState;
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Why a submit produced no rows.
#[derive(Debug)]
pub enum QueryError {
    /// Credential or backend misconfiguration, only discovered when translating.
    Config(LlmError),
    /// The model service failed or answered with something unreadable.
    Translation(LlmError),
    /// The generated text could not be run against the database.
    Execution(DbError),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::Config(err) | QueryError::Translation(err) => write!(f, "{}", err),
            QueryError::Execution(err) => write!(f, "{}", err),
        }
    }
}

impl Error for QueryError {}

impl From<LlmError> for QueryError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ConfigError(_) => QueryError::Config(err),
            other => QueryError::Translation(other),
        }
    }
}

impl From<DbError> for QueryError {
    fn from(err: DbError) -> Self {
        QueryError::Execution(err)
    }
}

/// One model call with the fixed STUDENT prompt.
pub async fn translate(llm: &LlmManager, question: &str) -> Result<String, QueryError> {
    debug!("Translating question: {}", question);
    let sql = llm.translate(question, STUDENT_PROMPT).await?;

    if let Some(table) = refused_table(&sql) {
        warn!("Model refused: table {} does not exist; the sentence will fail to execute", table);
    } else if !is_bare_output(&sql) {
        warn!("Model output contains code fences or a sql tag; running it as-is");
    }
    info!("Generated SQL: {}", sql);
    Ok(sql)
}

/// Runs `sql` on a blocking thread against the database at `database_path`.
pub async fn execute(sql: String, database_path: &Path) -> Result<ResultSet, QueryError> {
    let database_path: PathBuf = database_path.to_path_buf();

    let result = tokio::task::spawn_blocking(move || executor::execute(&sql, &database_path))
        .await
        .map_err(|join_err| {
            error!("Task join error: {}", join_err);
            DbError::Execution(format!("Database task execution failed: {}", join_err))
        })?;

    result.map_err(|err| {
        error!("Database query error: {}", err);
        QueryError::Execution(err)
    })
}

/// A full submit for one session: exactly one translation and, when it yields text,
/// exactly one execution.
///
/// The session's SQL is replaced (and hidden) as soon as translation succeeds, before the
/// text is executed, so a failing statement is still available to inspect.
pub async fn submit(
    llm: &LlmManager,
    database_path: &Path,
    question: &str,
    session: &mut SessionState,
) -> Result<ResultSet, QueryError> {
    let sql = translate(llm, question).await?;
    session.set_generated_sql(sql.clone());
    execute(sql, database_path).await
}
