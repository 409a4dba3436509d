use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mindspark_server::{
    config::Config,
    create_app,
    handlers::AppState,
    services::{OpenAiClient, RazorpayClient, SystemClock},
    storage::create_store,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mindspark_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store = create_store(&config).await?;
    let completion = Arc::new(OpenAiClient::from_config(&config)?);
    let payments = Arc::new(RazorpayClient::from_config(&config)?);

    let port = config.port;
    let state = AppState::new(config, store, Arc::new(SystemClock), completion, payments)?;
    let app = create_app(state);

    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
