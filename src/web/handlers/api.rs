use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use crate::db::executor::ResultSet;
use crate::db::schema::{describe_tables, TableInfo};
use crate::pipeline::{self, QueryError};
use crate::web::state::AppState;

// Query types

#[derive(Debug, Deserialize)]
pub struct ExecuteQueryRequest {
    pub query: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NlQueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

impl QueryResponse {
    fn new(sql: String, result: ResultSet, started: Instant) -> Self {
        Self {
            sql,
            row_count: result.row_count(),
            columns: result.columns,
            rows: result.rows,
            execution_time_ms: started.elapsed().as_millis() as u64,
        }
    }
}

// System status

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub llm_backend: String,
    pub llm_model: String,
    pub database: String,
    pub session_count: usize,
}

fn error_response(err: QueryError) -> (StatusCode, String) {
    let status = match &err {
        QueryError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        QueryError::Translation(_) => StatusCode::BAD_GATEWAY,
        QueryError::Execution(_) => StatusCode::BAD_REQUEST,
    };
    (status, format!("An error occurred: {}", err))
}

// Natural language query, stateless counterpart of the page's submit
pub async fn nl_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<NlQueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let started = Instant::now();

    let sql = pipeline::translate(&state.llm_manager, &payload.question)
        .await
        .map_err(error_response)?;

    let result = pipeline::execute(sql.clone(), &state.database_path)
        .await
        .map_err(error_response)?;

    info!("NL query returned {} rows in {}ms", result.row_count(), started.elapsed().as_millis());
    Ok(Json(QueryResponse::new(sql, result, started)))
}

// Query execution
pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteQueryRequest>,
) -> Result<Json<QueryResponse>, (StatusCode, String)> {
    let started = Instant::now();
    info!("Executing SQL query: {}", payload.query);

    let result = pipeline::execute(payload.query.clone(), &state.database_path)
        .await
        .map_err(error_response)?;

    Ok(Json(QueryResponse::new(payload.query, result, started)))
}

// Schema
pub async fn get_schema(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<TableInfo>>, (StatusCode, String)> {
    let database_path = state.database_path.clone();

    let tables = tokio::task::spawn_blocking(move || describe_tables(&database_path))
        .await
        .map_err(|e| {
            error!("Task join error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Schema task failed: {}", e))
        })?
        .map_err(|e| {
            error!("Failed to describe tables: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database error: {}", e))
        })?;

    Ok(Json(tables))
}

// System status
pub async fn system_status(State(state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let uptime = chrono::Utc::now()
        .signed_duration_since(state.startup_time)
        .num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        llm_backend: state.llm_manager.backend().to_string(),
        llm_model: state.llm_manager.model().to_string(),
        database: state.config.database.path.clone(),
        session_count: state.sessions.len().await,
    })
}
