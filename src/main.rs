use std::error::Error;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use trip_optimizer::config::Config;
use trip_optimizer::distance::NullCacheStore;
use trip_optimizer::http::{default_provider, router, AppState};
use trip_optimizer::store::TabularStoreClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    if !config.is_store_configured() {
        tracing::warn!("TABULAR_STORE_URL/TABULAR_STORE_SERVICE_KEY not set, running with an unconfigured store client");
    }

    let provider = default_provider(&config);
    let store = TabularStoreClient::new(&config)?;
    let cache: Box<dyn trip_optimizer::distance::DistanceCacheStore + Send + Sync> = if config.is_store_configured() {
        Box::new(store.clone())
    } else {
        Box::new(NullCacheStore)
    };

    let state = Arc::new(AppState {
        store: Box::new(store),
        cache,
        provider,
        config,
    });

    let app = router(state.clone());
    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "trip-optimizer listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
