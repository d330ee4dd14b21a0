mod config;

use std::net::SocketAddr;

use tracing::info;

use skill_api::AppStateInner;
use skill_db::{SqliteStore, Store};

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skill=debug,skill_api=debug,skill_db=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init store
    let store = if config.in_memory() {
        SqliteStore::open_in_memory()?
    } else {
        SqliteStore::open(&config.db_path, config.db_pool_size)?
    };

    if config.bootstrap || config.in_memory() {
        store.bootstrap()?;
    }

    let app = skill_api::router(AppStateInner::new(store));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Skill server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("cannot install SIGTERM handler: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
