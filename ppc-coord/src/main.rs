//! ppc-coord - Pooled Procurement Coordination service
//!
//! Coordinates multi-party procurement: ingestion job tracking, column
//! mapping resolution, committee decisions, and the hash-anchored audit
//! trail. File parsing and supplier scoring happen in the external workflow
//! engine; this service owns the lifecycle and the evidence.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use ppc_common::config::{CliOverrides, CoordConfig};
use ppc_common::events::EventBus;
use ppc_coord::services::EngineClient;
use ppc_coord::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "ppc-coord", about = "Pooled procurement coordination service")]
struct Args {
    /// Bind host
    #[arg(long)]
    host: Option<String>,

    /// Bind port
    #[arg(long)]
    port: Option<u16>,

    /// Path to the SQLite database
    #[arg(long)]
    database: Option<String>,

    /// Base URL of the external workflow engine
    #[arg(long)]
    engine_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting ppc-coord v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = CoordConfig::resolve(CliOverrides {
        host: args.host,
        port: args.port,
        database_path: args.database,
        engine_base_url: args.engine_url,
    })?;

    info!("Database: {}", config.database_path.display());
    match &config.engine_base_url {
        Some(url) => info!("Workflow engine: {}", url),
        None => info!("Workflow engine not configured; session-open will fail until it is"),
    }

    let db_pool = ppc_common::db::init_database(&config.database_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);
    let engine = EngineClient::new(config.engine_base_url.clone(), config.engine_timeout_ms)?;

    let state = AppState::new(db_pool, event_bus, engine);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    info!("Listening on http://{}", config.bind_addr());
    info!("Health check: http://{}/health", config.bind_addr());

    axum::serve(listener, app).await?;

    Ok(())
}
