use std::sync::Arc;

use axum::Router;
use innkeep_agent::{
    ConversationRuntime, LlmError, OpenAiCompatibleClient, PaymentConfirmationHandler,
    RuntimeComponents,
};
use innkeep_core::audit::{AuditSink, TracingAuditSink};
use innkeep_core::catalog::{Catalog, CatalogError, CatalogSource, DirectoryCatalogSource};
use innkeep_core::config::{AppConfig, ConfigError, LlmProvider, LoadOptions};
use innkeep_core::flows::{BookingFlow, FlowEngine};
use innkeep_core::payments::PaymentError;
use innkeep_core::ports::{ChannelError, PaymentProvider};
use innkeep_db::{connect_with_settings, migrations, DbPool, SqlReservationStore, SqlSessionStore};
use innkeep_whatsapp::GupshupSender;
use thiserror::Error;
use tracing::{info, warn};

use crate::health;
use crate::stripe::StripeClient;
use crate::webhooks::{self, WebhookState};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("messaging channel setup failed: {0}")]
    Channel(#[from] ChannelError),
    #[error("language model setup failed: {0}")]
    Llm(#[from] LlmError),
    #[error("payment provider setup failed: {0}")]
    Payments(#[from] PaymentError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires stores, collaborators and routes from an already loaded config.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database connected and migrations applied"
    );

    let knowledge = DirectoryCatalogSource::new(&config.knowledge.directory).load()?;
    let catalog = Arc::new(Catalog::from_knowledge(&knowledge));
    info!(
        event_name = "system.bootstrap.knowledge_loaded",
        correlation_id = "bootstrap",
        rooms = knowledge.rooms.len(),
        faqs = knowledge.faqs.len(),
        upsells = knowledge.upsells.len(),
        "knowledge base loaded"
    );

    let sender = Arc::new(GupshupSender::from_config(&config.whatsapp)?);
    if sender.is_dry_run() {
        warn!(
            event_name = "system.bootstrap.whatsapp_dry_run",
            correlation_id = "bootstrap",
            "whatsapp credentials missing; outbound messages are only logged"
        );
    }
    if config.llm.provider == LlmProvider::OpenAi && !config.llm.has_api_key() {
        warn!(
            event_name = "system.bootstrap.llm_unkeyed",
            correlation_id = "bootstrap",
            "llm api key not set; free-text questions may get the fallback reply"
        );
    }
    if !config.payments.has_webhook_secret() {
        warn!(
            event_name = "system.bootstrap.webhook_secret_missing",
            correlation_id = "bootstrap",
            "payment webhook secret not set; every payment webhook will be rejected"
        );
    }

    let llm = Arc::new(OpenAiCompatibleClient::from_config(&config.llm)?);
    let payments: Arc<dyn PaymentProvider> = Arc::new(StripeClient::from_config(&config.payments)?);
    let audit: Arc<dyn AuditSink> = Arc::new(TracingAuditSink);
    let reservations = Arc::new(SqlReservationStore::new(db_pool.clone()));
    let rooms = catalog.rooms().len();

    let runtime = ConversationRuntime::new(RuntimeComponents {
        engine: FlowEngine::new(BookingFlow::new(catalog, config.payments.currency.clone())),
        sessions: Arc::new(SqlSessionStore::new(db_pool.clone())),
        reservations: reservations.clone(),
        sender: sender.clone(),
        payments: payments.clone(),
        llm,
        retrieval: Arc::new(knowledge),
        audit: audit.clone(),
    });
    let confirmations = PaymentConfirmationHandler::new(
        reservations,
        sender,
        payments,
        audit,
        config.payments.currency.clone(),
    );

    let router = webhooks::router(WebhookState {
        runtime: Arc::new(runtime),
        confirmations: Arc::new(confirmations),
    })
    .merge(health::router(db_pool.clone(), rooms));

    Ok(Application { config, db_pool, router })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use innkeep_core::config::{ConfigOverrides, LoadOptions};
    use tempfile::TempDir;

    use crate::bootstrap::bootstrap;

    fn options(database_url: &str, dir: &TempDir) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                knowledge_directory: Some(dir.path().to_path_buf()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_migrates_and_loads_knowledge() {
        let dir = TempDir::new().expect("tempdir");
        fs::write(
            dir.path().join("rooms.json"),
            r#"{"rooms": [{"id": "deluxe", "name": "Deluxe Suite", "price": 120}]}"#,
        )
        .expect("write rooms");

        let url = format!("sqlite://{}", dir.path().join("innkeep.db").display());

        let app = bootstrap(options(&url, &dir)).await.expect("bootstrap");

        let (tables,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
             AND name IN ('session', 'reservation')",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("count tables");
        assert_eq!(tables, 2);
        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_rejects_non_sqlite_database() {
        let dir = TempDir::new().expect("tempdir");
        let result = bootstrap(options("postgres://localhost/innkeep", &dir)).await;

        let message = result.err().map(|error| error.to_string()).unwrap_or_default();
        assert!(message.contains("database.url"), "unexpected error: {message}");
    }
}
