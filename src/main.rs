//! sitebeat - self-hosted website analytics
//!
//! Accepts pageview/event beacons from tracked sites and serves traffic
//! reports (totals, top pages, referrers, devices, geography) to site
//! owners, backed by per-day rollup counters:
//! - Beacon ingestion with IP anonymization, GeoIP and user-agent parsing
//! - Session stitching with a fixed inactivity window
//! - Atomic daily rollups for cheap dashboard reads

mod config;
mod db;
mod enrich;
mod error;
mod geoip;
mod web;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before any other initialization)
    let _ = dotenvy::dotenv();

    // Load configuration
    let config = config::Config::load()?;

    // Initialize logging; RUST_LOG overrides the configured level.
    // Use LOG_FORMAT=gcp for structured GCP Cloud Logging.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "gcp" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting sitebeat...");
    info!("Configuration loaded");

    // Initialize database
    let db = db::Database::new(&config.database).await?;
    db.run_migrations().await?;
    info!("Database initialized");

    // Initialize GeoIP once; readers are shared read-only from here on
    let geoip = Arc::new(geoip::GeoIp::new(
        &config.geoip.city_database,
        &config.geoip.asn_database,
    ));
    if geoip.is_available() {
        info!("GeoIP enabled");
    } else {
        info!("GeoIP disabled (database not found)");
    }

    // Start web server (blocking)
    web::start_server(&config, db, geoip).await?;

    Ok(())
}
