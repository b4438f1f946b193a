//! ClipRelay - clipboard synchronization through a central relay
//!
//! This is the main entry point for both the relay and the peer.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cliprelay::cli::{Cli, CliHandler};
use cliprelay::{Config, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_config(cli.config.as_deref())?;

    // Initialize logging
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("cliprelay={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("ClipRelay v{}", VERSION);

    let mut handler = CliHandler::new(config);
    handler.handle_command(cli.command).await?;

    Ok(())
}
