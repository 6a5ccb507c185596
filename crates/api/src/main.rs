use anyhow::Context;

use stockledger_api::{app, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load().context("failed to load configuration")?;
    stockledger_observability::init_with(&config.logging);

    let ledger = app::services::build_ledger(&config).await?;
    let _event_log = app::services::spawn_event_log(&ledger);
    let router = app::build_app(ledger);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router).await?;
    Ok(())
}
