use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod db;
mod llm;
mod pipeline;
mod prompt;
mod session;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::schema::{describe_tables, missing_columns};
use crate::llm::LlmManager;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(false);
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Initialize logging
    init_tracing(config.logging.json);

    // Initialize LLM manager
    info!(
        "Initializing LLM manager with backend: {} (model {})",
        config.llm.backend, config.llm.model
    );
    let llm_manager = LlmManager::new(&config.llm)?;
    if config.llm.resolve_api_key().is_none() && config.llm.backend != "ollama" {
        warn!(
            "No API key found in {}; translations will fail until one is provided",
            config.llm.api_key_env
        );
    }

    let app_state = Arc::new(AppState::new(config.clone(), llm_manager));

    // The database is never created or migrated here, only checked
    info!("Checking database at {}", app_state.database_path.display());
    let database_path = app_state.database_path.clone();
    match tokio::task::spawn_blocking(move || describe_tables(&database_path)).await? {
        Ok(tables) => match tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(prompt::TABLE_NAME))
        {
            Some(table) => {
                let missing = missing_columns(table, &prompt::COLUMNS);
                if missing.is_empty() {
                    info!("Found {} table with {} columns", table.name, table.columns.len());
                } else {
                    warn!("{} table is missing columns: {:?}", table.name, missing);
                }
            }
            None => warn!("No {} table found; queries will fail", prompt::TABLE_NAME),
        },
        Err(e) => warn!("Could not inspect database: {}", e),
    }

    // Start the web server
    info!("Starting QueryBridge server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
