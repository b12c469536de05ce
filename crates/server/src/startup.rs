use std::{net::SocketAddr, sync::Arc};

use axum::Router;
use dotenvy::dotenv;
use migration::MigratorTrait;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use common::utils::logging::init_logging;
use configs::{AppConfig, StoreKind};
use service::store::{DocumentStore, MemoryDocumentStore, SeaOrmDocumentStore};

use crate::errors::StartupError;
use crate::routes;
use crate::state::AppState;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Config from `CONFIG_PATH`, or defaults plus `DATABASE_URL` when the file is absent.
pub fn load_config() -> Result<(AppConfig, Option<anyhow::Error>), StartupError> {
    match AppConfig::load_and_validate() {
        Ok(cfg) => Ok((cfg, None)),
        Err(e) => {
            let mut cfg = AppConfig::default();
            cfg.normalize_and_validate()
                .map_err(|v| StartupError::InvalidConfig(format!("{v} (config file: {e})")))?;
            Ok((cfg, Some(e)))
        }
    }
}

/// Connect the configured document store, running migrations for Postgres.
pub async fn build_store(cfg: &AppConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match cfg.catalog.store {
        StoreKind::Memory => {
            info!("using in-memory document store");
            Ok(Arc::new(MemoryDocumentStore::new()))
        }
        StoreKind::Postgres => {
            let db = models::db::connect_with_config(&cfg.database).await?;
            migration::Migrator::up(&db, None).await?;
            info!("postgres document store ready");
            Ok(Arc::new(SeaOrmDocumentStore::new(db)))
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    routes::build_router(state, build_cors())
}

fn bind_addr(cfg: &AppConfig) -> anyhow::Result<SocketAddr> {
    Ok(format!("{}:{}", cfg.server.host, cfg.server.port).parse()?)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl_c listener failed");
    }
    info!("shutdown signal received");
}

/// Public entry: build the app and run the HTTP server
pub async fn run() -> anyhow::Result<()> {
    dotenv().ok();
    let (cfg, fallback) = load_config()?;
    init_logging(&cfg.server.log_format);
    if let Some(e) = fallback {
        warn!(error = %e, "config file not loaded, using defaults");
    }

    let store = build_store(&cfg).await?;
    let app = build_app(AppState::new(store, cfg.catalog.clone()));

    let addr = bind_addr(&cfg)?;
    info!(%addr, store = ?cfg.catalog.store, "starting catalog server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}
