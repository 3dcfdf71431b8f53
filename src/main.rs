//! Status board binary

use clap::Parser;
use status_board::{Config, Dashboard, Result};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Parser)]
#[command(version, about = "Endpoint availability and commit activity dashboard")]
struct Cli {
    /// Address the HTTP server listens on
    #[arg(long, env = "BIND_ADDRESS", default_value = "0.0.0.0:8080")]
    bind: String,

    /// JSON file listing the endpoints to monitor
    #[arg(long, env = "ENDPOINTS_FILE")]
    endpoints: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    initialize_tracing();

    info!("Starting status board v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env();

    if let Some(path) = &cli.endpoints {
        if let Err(e) = config.load_endpoints_file(path) {
            error!("Failed to load endpoints from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }

    info!(
        "Monitoring {} endpoints, aggregating {} repositories of account '{}'",
        config.endpoints.len(),
        config.repositories.len(),
        config.account
    );

    let dashboard = match Dashboard::new(config) {
        Ok(dashboard) => dashboard,
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = dashboard.run(&cli.bind).await {
        error!("Status board failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Install the JSON subscriber, filtered by `RUST_LOG`
fn initialize_tracing() {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .json();

    tracing_subscriber::registry()
        .with(log_filter(std::env::var("RUST_LOG").ok()))
        .with(fmt_layer)
        .init();
}

/// Filter from the given directives, `info` when absent or unparseable
fn log_filter(directives: Option<String>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
