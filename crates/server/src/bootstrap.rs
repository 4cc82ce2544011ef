use std::sync::Arc;

use procura_core::config::{AppConfig, ConfigError, LoadOptions};
use procura_core::session::SessionRegistry;
use procura_core::workflow::ApprovalEngine;
use procura_db::{connect_with_config, migrations, DbPool, PurchaseService, SqlPurchaseRepository};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<PurchaseService>,
    pub sessions: SessionRegistry,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

#[cfg_attr(not(test), allow(dead_code))]
pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool =
        connect_with_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        max_connections = config.database.max_connections,
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let engine = ApprovalEngine::with_threshold(config.workflow.approval_threshold);
    let service = Arc::new(PurchaseService::from_repository(
        SqlPurchaseRepository::new(db_pool.clone()),
        engine,
    ));
    let sessions = SessionRegistry::from_config(&config.auth);
    info!(
        event_name = "system.bootstrap.workflow_ready",
        correlation_id = "bootstrap",
        approval_threshold = %engine.threshold(),
        session_ttl_minutes = config.auth.session_ttl_minutes,
        "approval workflow initialized"
    );

    Ok(Application { config, db_pool, service, sessions })
}
