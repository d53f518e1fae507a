//! gaia-harness CLI entry point.
//!
//! Loads `.env`, initializes logging and delegates to the CLI module for
//! command handling.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // API keys usually live in a .env file next to the harness
    dotenv::dotenv().ok();

    // Parse CLI arguments first to get log_level
    let cli = gaia_harness::cli::parse_cli();

    // Priority: RUST_LOG env var > --log-level CLI arg > default "info"
    let log_filter = cli.log_filter();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_new(&log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    gaia_harness::cli::run_with_cli(cli).await
}
