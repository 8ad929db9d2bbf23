use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use assembly_portal::config::{AppConfig, StorageBackend};
use assembly_portal::database::{Database, MemoryDatabase, PgDatabase};
use assembly_portal::{app, logging, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up JWT_SECRET, DATABASE_URL, etc.
    let _ = dotenvy::dotenv();
    logging::init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!("Starting Assembly Portal API in {:?} mode", config.environment);

    match config.database.backend {
        StorageBackend::Postgres => {
            let db = PgDatabase::connect(&config.database)
                .await
                .context("failed to open database")?;
            serve(Arc::new(db), config).await
        }
        StorageBackend::Memory => {
            info!("Using in-memory storage; data is lost on exit");
            serve(Arc::new(MemoryDatabase::new()), config).await
        }
    }
}

async fn serve<D: Database + 'static>(db: Arc<D>, config: AppConfig) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr();
    let state = AppState::new(db.clone(), config);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!("Assembly Portal API listening on http://{}", bind_addr);

    let result = axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error");

    db.close().await;
    info!("Shutdown complete");
    result
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
