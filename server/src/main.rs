use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info};

use radio_engine::Relay;
use radio_relay::config::Cli;
use radio_relay::{init_logging, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = cli.into_config()?;
    info!(
        listen = %config.listen_addr,
        pipe = %config.pipe_path,
        signal = %config.signal_path,
        "Starting radio relay"
    );

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    let relay = Relay::start(config).context("failed to start relay")?;
    let app = router(relay.clone());

    info!("Listening on http://{}", listener.local_addr()?);
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    relay.shutdown().await;
    info!("Radio relay stopped");

    served.context("HTTP server failed")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
