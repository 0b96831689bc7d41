use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod core;
mod config;
mod error;

use cli::Cli;
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for per-URL results and reports
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting sitewatch v{}", env!("CARGO_PKG_VERSION"));

    // Lists, config and cache live next to the binary
    let base_dir = config::executable_dir()?;
    let mut config = Config::load_or_default(cli.config.as_deref(), &base_dir)?;
    config.resolve_paths(&base_dir);

    cli.execute(config).await
}
