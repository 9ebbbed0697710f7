use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use soberly_agent::{ChatRuntime, ChatSettings, LlmError, OpenAiCompatibleClient};
use soberly_core::config::{AppConfig, ConfigError, LoadOptions};
use soberly_db::{connect_from_config, migrations, DbPool, Repositories};

use crate::auth::{IdentityProvider, SessionIdentityProvider};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub repositories: Repositories,
    pub chat_runtime: Arc<ChatRuntime>,
    pub identity: Arc<dyn IdentityProvider>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("completion client setup failed: {0}")]
    CompletionClient(#[source] LlmError),
    #[error("chat runtime setup failed: {0}")]
    Runtime(String),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        "starting application bootstrap"
    );

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let repositories = Repositories::sql(db_pool.clone());
    let client =
        OpenAiCompatibleClient::new(&config.llm).map_err(BootstrapError::CompletionClient)?;
    let chat_runtime = ChatRuntime::new(
        ChatSettings::from_config(&config),
        Arc::new(client),
        repositories.clone(),
    )
    .map_err(|error| BootstrapError::Runtime(error.to_string()))?;
    let identity = SessionIdentityProvider::new(repositories.auth_sessions.clone());

    Ok(Application {
        config,
        db_pool,
        repositories,
        chat_runtime: Arc::new(chat_runtime),
        identity: Arc::new(identity),
    })
}
