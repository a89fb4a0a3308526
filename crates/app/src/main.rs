use std::sync::Arc;

use engine::{Broker, Event, EventKind, EventSink, NotifyError, Subscriber};
use migration::{Migrator, MigratorTrait};

mod settings;

/// Writes every lifecycle event to the log.
struct EventLog;

#[async_trait::async_trait]
impl Subscriber for EventLog {
    async fn handle(&self, event: &Event) -> Result<(), NotifyError> {
        tracing::info!(
            event_id = %event.id(),
            kind = event.kind().as_str(),
            subject_id = event.subject_id(),
            "ledger event"
        );
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "ledgerd={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;

    let broker = Broker::new();
    let log = Arc::new(EventLog);
    for kind in EventKind::ALL {
        broker.subscribe(kind, log.clone())?;
    }

    let engine = engine::Engine::builder()
        .database(db)
        .events(Arc::new(broker.clone()))
        .build()
        .await?;

    let previews = engine.account_previews(chrono::Utc::now()).await?;
    tracing::info!(accounts = previews.len(), "ledger ready");
    for preview in &previews {
        let balance = preview.balance.total()?;
        tracing::debug!(
            account_id = preview.account.id,
            kind = preview.account.kind.as_str(),
            balance,
            "account"
        );
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    broker.shutdown().await;

    Ok(())
}

async fn parse_database(
    config: &settings::Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let database = sea_orm::Database::connect(config.url()).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
