use anyhow::Context;

use stockledger_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    stockledger_observability::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let app = stockledger_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        max_conflict_retries = config.max_conflict_retries,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
