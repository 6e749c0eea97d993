use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use craft_relay_server::config::ServerConfig;
use craft_relay_server::metrics::{self, Metrics};
use craft_relay_server::net::transport::RelayServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging (RUST_LOG overrides the default level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Craft Relay Server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = ServerConfig::load_or_default();
    config.validate()?;
    info!(
        "Configuration loaded: {}:{}, reconcile every {}ms",
        config.bind_address, config.port, config.reconcile_interval_ms
    );

    let metrics = Arc::new(Metrics::new());

    if config.metrics_port != 0 {
        let metrics_clone = metrics.clone();
        let metrics_port = config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    // Failing to bind is fatal
    let server = RelayServer::bind(config, metrics).await?;
    info!("Server ready on ws://{}", server.local_addr()?);

    let session = server.session();

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Failed to listen for Ctrl+C: {}", e);
            }
            info!("Shutting down...");
        }
    }

    let session = session.read().await;
    info!(
        "Server stopped ({} crafts, {} connections)",
        session.registry().len(),
        session.connection_count()
    );

    Ok(())
}
