use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folio_api::config::Config;
use folio_api::routes::build_router;
use folio_api::state::AppState;
use folio_api::store::{JsonDirStore, MemoryStore, PortfolioStore};
use folio_api::uploads::CertificateStorage;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("folio_api={},tower_http={}", config.rust_log, config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Folio API v{}", env!("CARGO_PKG_VERSION"));

    let store: Arc<dyn PortfolioStore> = match &config.store_dir {
        Some(dir) => Arc::new(
            JsonDirStore::open(dir).context("Failed to open portfolio store directory")?,
        ),
        None => {
            info!("Using in-memory portfolio store; records are lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let certificates = CertificateStorage::open(&config.upload_dir, config.max_upload_bytes)
        .with_context(|| {
            format!(
                "Failed to create uploads directory {}",
                config.upload_dir.display()
            )
        })?;

    let state = AppState {
        store,
        certificates,
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");
    info!("API endpoint: http://localhost:{}/api", config.port);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
