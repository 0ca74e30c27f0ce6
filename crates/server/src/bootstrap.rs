use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use fieldrep_agent::{AgentRuntime, GroqClient, LlmClient, LlmError, SessionStore, UnconfiguredLlm};
use fieldrep_core::config::{AppConfig, ConfigError, LoadOptions};
use fieldrep_db::repositories::SqlInteractionRepository;
use fieldrep_db::{connect_with_settings, migrations, DbPool};

use crate::api::ApiState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub state: ApiState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client initialization failed: {0}")]
    Llm(#[source] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let llm: Arc<dyn LlmClient> = match GroqClient::from_config(&config.llm) {
        Ok(client) => Arc::new(client),
        // Boot without an extraction oracle: saved-interaction routes and
        // health still work, chat turns answer with a recovery message.
        Err(LlmError::MissingApiKey) => {
            warn!(
                event_name = "system.bootstrap.llm_unconfigured",
                "no llm api key configured; chat extraction is disabled"
            );
            Arc::new(UnconfiguredLlm)
        }
        Err(error) => return Err(BootstrapError::Llm(error)),
    };

    let state = ApiState {
        runtime: Arc::new(AgentRuntime::new(llm)),
        sessions: Arc::new(SessionStore::new()),
        repository: Arc::new(SqlInteractionRepository::new(db_pool.clone())),
    };

    Ok(Application { config, db_pool, state })
}
