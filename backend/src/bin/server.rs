//! Astro Planner HTTP Server Binary
//!
//! Loads the analysis configuration, opens the settings store and serves the
//! REST API.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin planner-server
//!
//! # Keep preferences in memory only
//! PLANNER_SETTINGS_STORE=memory cargo run --bin planner-server
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `RUST_LOG`: Log level (default: info)
//! - `PLANNER_SETTINGS_STORE`: `file` (default) or `memory`
//! - `PLANNER_SETTINGS_PATH`, `PLANNER_BURST_THRESHOLD`, `PLANNER_MERGE_GAP_SECS`,
//!   `PLANNER_CORRELATION_WINDOW_SECS`: override `planner.toml`

use std::env;
use std::net::SocketAddr;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use astro_planner::http::{create_router, AppState};
use astro_planner::settings::SettingsStoreFactory;
use astro_planner::AnalysisConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting Astro Planner HTTP Server");

    let config = AnalysisConfig::load()?;
    info!(
        "Burst threshold {} px, merge gap {} s, correlation window {} s",
        config.bursts.threshold, config.bursts.merge_gap_secs, config.bursts.correlation_window_secs
    );

    let settings = SettingsStoreFactory::from_config(&config);
    info!("Settings backend: {}", settings.backend_name());

    let app = create_router(AppState::new(config, settings));

    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = env::var("PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
