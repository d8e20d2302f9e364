//! Micro-loan service entry point.
//!
//! Opens the SQLite loan store, wires it into the loan ledger, and exposes
//! the ledger's operations over a small Axum REST API.

mod api;
mod config;
mod db;
mod errors;

use std::sync::Arc;

use loan_ledger::LoanLedger;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Config;
use db::SqliteGateway;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url, config.db_max_connections).await?;

    let ledger = LoanLedger::new(SqliteGateway::new(pool.clone()));
    let app = api::router(Arc::new(api::ApiState { ledger }));

    // ─── Shutdown on Ctrl-C ───────────────────────────────
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {e}");
                return;
            }
            info!("Shutdown requested");
            shutdown.cancel();
        });
    }

    // ─── REST API ─────────────────────────────────────────
    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    pool.close().await;
    info!("Server stopped");
    Ok(())
}
