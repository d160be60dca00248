use crate::config::AppConfig;
use crate::llm::LlmManager;
use crate::session::SessionStore;
use crate::web::templates::init_templates;
use minijinja::Environment;
use std::path::PathBuf;
use std::time::Duration;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub template_env: Environment<'static>,
    pub llm_manager: LlmManager,
    /// Opened afresh by every execution, never pooled
    pub database_path: PathBuf,
    pub sessions: SessionStore,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, llm_manager: LlmManager) -> Self {
        let database_path = PathBuf::from(&config.database.path);
        let idle_timeout = Duration::from_secs(config.web.session_idle_secs);

        Self {
            config,
            template_env: init_templates(),
            llm_manager,
            database_path,
            sessions: SessionStore::new(idle_timeout),
            startup_time: chrono::Utc::now(),
        }
    }
}
