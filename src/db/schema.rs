use crate::db::DbError;
use duckdb::{AccessMode, Config, Connection};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableInfo {
    pub name: String,
    pub columns: Vec<ColumnInfo>,
}

/// Lists user tables and their columns. Opens the file read-only and never creates it.
pub fn describe_tables(database_path: &Path) -> Result<Vec<TableInfo>, DbError> {
    if !database_path.is_file() {
        return Err(DbError::Open(format!(
            "Database file not found: {}",
            database_path.display()
        )));
    }

    let config = Config::default()
        .access_mode(AccessMode::ReadOnly)
        .map_err(|e| DbError::Open(e.to_string()))?;
    let conn = Connection::open_with_flags(database_path, config)
        .map_err(|e| DbError::Open(e.to_string()))?;

    let mut stmt = conn.prepare(
        "SELECT table_name, column_name, data_type, is_nullable
         FROM information_schema.columns
         WHERE table_schema = 'main'
         ORDER BY table_name, ordinal_position",
    )?;

    let column_rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?, // table_name
            row.get::<_, String>(1)?, // column_name
            row.get::<_, String>(2)?, // data_type
            row.get::<_, String>(3)? == "YES", // is_nullable
        ))
    })?;

    let mut tables: Vec<TableInfo> = Vec::new();
    for column_row in column_rows {
        let (table_name, name, data_type, nullable) = column_row?;
        let column = ColumnInfo {
            name,
            data_type,
            nullable,
        };

        match tables.last_mut() {
            Some(table) if table.name == table_name => table.columns.push(column),
            _ => tables.push(TableInfo {
                name: table_name,
                columns: vec![column],
            }),
        }
    }

    Ok(tables)
}

/// Names from `expected` that `table` lacks, compared case-insensitively.
pub fn missing_columns<'a>(table: &TableInfo, expected: &[&'a str]) -> Vec<&'a str> {
    expected
        .iter()
        .filter(|wanted| {
            !table
                .columns
                .iter()
                .any(|column| column.name.eq_ignore_ascii_case(wanted))
        })
        .copied()
        .collect()
}
