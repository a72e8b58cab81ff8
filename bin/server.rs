// Tracker Catalog - Web Server
// REST API with Axum over the catalog database

use anyhow::{Context, Result};
use clap::Parser;
use rusqlite::Connection;
use std::path::PathBuf;
use tracing::info;
use tracker_catalog::api::{router, AppState};
use tracker_catalog::config::{Config, DEFAULT_CONFIG_PATH};
use tracker_catalog::{logging, setup_database};

#[derive(Parser)]
#[command(name = "tracker-server", version, about = "Serve the tracker catalog over HTTP")]
struct Args {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH, env = "CATALOG_CONFIG")]
    config: PathBuf,

    /// Catalog database, overrides the configuration file
    #[arg(long, env = "CATALOG_DATABASE")]
    database: Option<PathBuf>,

    /// Address to listen on, overrides the configuration file
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    logging::init(&config.logging.filter);

    let db_path = args.database.unwrap_or(config.database.path);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
    setup_database(&conn)?;
    info!(database = %db_path.display(), "database opened");

    let app = router(AppState::new(conn));

    let addr = args.bind.unwrap_or(config.server.bind);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   API:    http://{}/api/trackers", addr);
    println!("   Export: http://{}/trackers/export", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
