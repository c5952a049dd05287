//! Request guard sidecar.
//!
//! ```text
//!     Client ──▶ identity ──▶ rate limit ──▶ CSRF ──▶ proxy ──▶ Upstream
//!                                              │
//!                                   GET /api/csrf-token
//! ```

use std::path::PathBuf;

use clap::Parser;

use request_guard::config::{load_config, loader::{parse_config, SECRET_ENV_VAR}};
use request_guard::lifecycle::startup;
use request_guard::observability::logging;

#[derive(Parser)]
#[command(name = "request-guard", version)]
#[command(about = "CSRF and rate limiting sidecar", long_about = None)]
struct Args {
    /// Path to a TOML config file, watched for changes
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => parse_config("", std::env::var(SECRET_ENV_VAR).ok())?,
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        upstream = ?config.upstream.as_ref().map(|u| &u.address),
        "request-guard starting"
    );

    startup::run(config, args.config).await?;
    Ok(())
}
