//! # relaycore-server
//!
//! Main binary: loads configuration, connects and migrates the SQLite
//! database, and serves the data-plane API.

use relaycore_api::{build_router, AppState};
use relaycore_db::Database;
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = relaycore_common::config::init()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "relaycore=debug,tower_http=debug".into()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    tracing::info!("starting relaycore v{}", env!("CARGO_PKG_VERSION"));

    let db = Database::connect(config).await?;
    db.migrate().await?;

    let api_state = AppState::new(db);
    let router = build_router(api_state);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    tracing::info!("listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
