//! Procurement Document Engine - Backend Server

use std::{net::SocketAddr, sync::Arc};

use procurement_backend::{
    config::{Config, StorageBackend},
    create_app,
    services::ApprovalService,
    AppError, AppState, MemoryStore, PgStore, ProcurementStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "procurement_server=debug,procurement_backend=debug,tower_http=debug,sqlx=warn"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Procurement Document Engine");
    tracing::info!("Environment: {}", config.environment);

    let store = open_store(&config).await?;
    let state = AppState::new(store, config.clone());

    ApprovalService::new(state.store.clone())
        .seed_defaults(&config.approvals)
        .await?;

    // Build application
    let app = create_app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| AppError::Configuration(format!("invalid server address: {}", e)))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn ProcurementStore>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let store = PgStore::connect(&config.database).await?;
            tracing::info!("Database connection established");

            // Run migrations in development
            if config.environment == "development" {
                tracing::info!("Running database migrations...");
                sqlx::migrate!("./migrations").run(store.pool()).await?;
                tracing::info!("Migrations completed");
            }

            Ok(Arc::new(store))
        }
    }
}
