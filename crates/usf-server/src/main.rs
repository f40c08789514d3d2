//! USF Server — composition root for the override overlay.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;
use usf_core::repository::Pagination;
use usf_db::{DbConfig, DbManager};
use usf_overlay::{HookTable, Overlay, OverlayConfig};

const DEFAULT_CONFIG_PATH: &str = "userspecificfunctions.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("usf=info")),
        )
        .json()
        .init();

    tracing::info!("Starting USF server...");

    let config_path =
        std::env::var("USF_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = OverlayConfig::load(&config_path)
        .with_context(|| format!("loading overlay config from {config_path}"))?;

    let db_config = DbConfig::from_env();
    let db = DbManager::connect(&db_config)
        .await
        .context("connecting to SurrealDB")?;
    usf_db::run_migrations(db.client())
        .await
        .context("running migrations")?;

    let overlay = Arc::new(Overlay::new(db.overrides(), config));
    let stored = overlay
        .admin()
        .list(Pagination {
            offset: 0,
            limit: 1,
        })
        .await
        .context("counting override records")?
        .total;
    tracing::info!(
        records = stored,
        above_heads = overlay.config().chat_above_heads,
        "Overlay ready"
    );

    // The embedding server's event loop fires hooks on this table.
    let hooks = HookTable::new();
    let registration = overlay.register(&hooks);

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!(sessions = overlay.cache().len(), "Shutting down");
    drop(registration);

    overlay
        .config()
        .save(&config_path)
        .with_context(|| format!("saving overlay config to {config_path}"))?;

    tracing::info!("USF server stopped.");
    Ok(())
}
