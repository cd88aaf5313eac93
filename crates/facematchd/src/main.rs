use anyhow::{Context, Result};
use facematch_core::Embedder;
use facematch_store::SqliteStore;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod embedder;
mod engine;

use config::{BusKind, Config};
use dbus_interface::{IdentityService, BUS_NAME, OBJECT_PATH};
use embedder::CommandEmbedder;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facematchd starting");

    let config = Config::load()?;
    tracing::info!(
        db = %config.db_path.display(),
        tolerance = config.tolerance,
        embedding_dim = ?config.embedding_dim,
        bus = ?config.bus,
        "configuration loaded"
    );

    let store = SqliteStore::open(&config.db_path, config.embedding_dim)
        .with_context(|| format!("opening {}", config.db_path.display()))?;

    let embedder = config
        .embedder_command
        .as_deref()
        .and_then(CommandEmbedder::from_argv)
        .map(|e| Box::new(e) as Box<dyn Embedder>);

    let engine = engine::spawn_engine(store, embedder, config.tolerance)?;

    let builder = match config.bus {
        BusKind::Session => zbus::connection::Builder::session()?,
        BusKind::System => zbus::connection::Builder::system()?,
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, IdentityService::new(engine))?
        .build()
        .await
        .context("registering on D-Bus")?;

    tracing::info!(name = BUS_NAME, path = OBJECT_PATH, "facematchd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("facematchd shutting down");

    Ok(())
}
