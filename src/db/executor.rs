use crate::db::DbError;
use arrow::record_batch::RecordBatch;
use arrow::util::display::{ArrayFormatter, FormatOptions};
use duckdb::Connection;
use serde::Serialize;
use std::path::Path;
use tracing::debug;

/// Rows produced by one statement, every cell already rendered for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Width of the grid: the first row's length, falling back to the column header count.
    pub fn column_count(&self) -> usize {
        self.rows
            .first()
            .map(|row| row.len())
            .unwrap_or(self.columns.len())
    }
}

/// Runs `sql` verbatim against the database file at `database_path`.
///
/// A fresh connection is opened for every call and dropped before returning. The statement
/// runs inside a transaction that is committed on success; on any failure the transaction
/// and the connection are dropped, which rolls back and closes them.
pub fn execute(sql: &str, database_path: &Path) -> Result<ResultSet, DbError> {
    if !database_path.is_file() {
        return Err(DbError::Open(format!(
            "Database file not found: {}",
            database_path.display()
        )));
    }

    let mut conn = Connection::open(database_path).map_err(|e| {
        DbError::Open(format!(
            "Failed to open database at {}: {}",
            database_path.display(),
            e
        ))
    })?;

    let tx = conn.transaction()?;

    let (columns, record_batches) = {
        let mut stmt = tx.prepare(sql)?;
        let arrow_batch = stmt.query_arrow([])?;
        let schema = arrow_batch.get_schema();

        let columns = schema
            .fields()
            .iter()
            .map(|field| field.name().clone())
            .collect::<Vec<String>>();

        (columns, arrow_batch.collect::<Vec<RecordBatch>>())
    };

    // INSERT/UPDATE/DELETE answer with a one-cell `Count` table, not with rows
    if reports_changed_rows(sql, &columns) {
        tx.commit()?;
        debug!("Statement changed rows; returning an empty result");
        return Ok(ResultSet {
            columns: Vec::new(),
            rows: Vec::new(),
        });
    }

    let rows = materialize(&record_batches)?;
    tx.commit()?;

    debug!("Statement returned {} rows across {} batches", rows.len(), record_batches.len());
    Ok(ResultSet { columns, rows })
}

/// True for a data-modifying statement without RETURNING whose result is DuckDB's row count.
fn reports_changed_rows(sql: &str, columns: &[String]) -> bool {
    const MODIFYING_KEYWORDS: [&str; 3] = ["INSERT", "UPDATE", "DELETE"];

    let statement = sql.trim_start().to_uppercase();
    let modifying = MODIFYING_KEYWORDS
        .iter()
        .any(|keyword| statement.starts_with(keyword));

    modifying
        && !statement.contains("RETURNING")
        && columns.len() == 1
        && columns[0] == "Count"
}

fn materialize(record_batches: &[RecordBatch]) -> Result<Vec<Vec<String>>, DbError> {
    let options = FormatOptions::default().with_null("NULL");
    let mut rows = Vec::new();

    for batch in record_batches {
        let formatters = batch
            .columns()
            .iter()
            .map(|column| ArrayFormatter::try_new(column.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()?;

        for row in 0..batch.num_rows() {
            let cells = formatters
                .iter()
                .map(|formatter| formatter.value(row).try_to_string())
                .collect::<Result<Vec<String>, _>>()?;
            rows.push(cells);
        }
    }

    Ok(rows)
}
