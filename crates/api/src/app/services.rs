//! Infrastructure wiring: event store backend, ledger service, bus listener.

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;

use stockledger_infra::StockLedger;
use stockledger_infra::event_store::{EventStore, InMemoryEventStore, PostgresEventStore};

use crate::config::{AppConfig, StorageBackend};

/// Build the ledger service for the configured backend.
///
/// With Postgres the schema is applied and the read models are rebuilt from
/// the stored events before the service is handed out.
pub async fn build_ledger(config: &AppConfig) -> anyhow::Result<Arc<StockLedger>> {
    let store: Arc<dyn EventStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("using the in-memory event store; data is lost on exit");
            Arc::new(InMemoryEventStore::new())
        }
        StorageBackend::Postgres => {
            let url = config
                .storage
                .database_url
                .as_deref()
                .context("storage.database_url is not set")?;
            let pool = PgPoolOptions::new()
                .max_connections(config.storage.max_connections)
                .connect(url)
                .await
                .context("failed to connect to postgres")?;
            let store = PostgresEventStore::new(pool);
            store.migrate().await.context("failed to apply the event store schema")?;
            Arc::new(store)
        }
    };

    let ledger = Arc::new(StockLedger::new(store, config.workflow.clone()));
    let report = ledger
        .rebuild_read_models()
        .context("failed to rebuild read models")?;
    tracing::info!(events = report.events, projections = report.projections, "read models ready");
    Ok(ledger)
}

/// Trace every committed event off the bus until the ledger is dropped.
pub fn spawn_event_log(ledger: &StockLedger) -> tokio::task::JoinHandle<()> {
    let sub = ledger.subscribe();
    tokio::task::spawn_blocking(move || {
        while let Ok(env) = sub.recv() {
            tracing::debug!(
                event_type = env.event_type(),
                aggregate_type = env.aggregate_type(),
                aggregate_id = %env.aggregate_id(),
                sequence = env.sequence_number(),
                occurred_at = %env.occurred_at(),
                "event published"
            );
        }
    })
}
