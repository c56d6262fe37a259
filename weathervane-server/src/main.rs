use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use weathervane_server::{init_tracing, router, AppState, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_format).context("failed to initialize logging")?;

    let (config, llm) = cli.into_parts();
    let bind = config.bind;
    tracing::info!(model = %llm.model, base_url = %llm.base_url, "configuring weather assistant");
    let state = AppState::from_settings(config, llm).context("failed to build application state")?;

    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    tracing::info!(addr = %bind, "weathervane listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
