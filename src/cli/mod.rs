use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::clipboard::{self, ClipboardProvider};
use crate::config::Config;
use crate::relay::{Relay, RelayServer};
use crate::sync::Reconciler;
use crate::transport;

#[derive(Parser)]
#[command(name = "cliprelay")]
#[command(about = "Clipboard synchronization through a central relay")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, visible_alias = "debug")]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the relay that peers connect to")]
    Relay {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,
    },

    #[command(about = "Sync the local clipboard through a relay")]
    Peer {
        #[arg(short, long)]
        url: Option<String>,

        #[arg(short, long, help = "Polling interval in milliseconds")]
        interval: Option<u64>,

        #[arg(short, long)]
        slot: Option<String>,

        #[arg(short, long, help = "Sync this file instead of the system clipboard")]
        file: Option<PathBuf>,
    },

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Generate example configuration")]
    Init {
        #[arg(long)]
        force: bool,
    },
}

pub struct CliHandler {
    config: Config,
}

impl CliHandler {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn handle_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Relay { port, host } => {
                if let Some(port) = port {
                    self.config.relay.port = port;
                }
                if let Some(host) = host {
                    self.config.relay.host = host;
                }
                self.config.validate()?;
                self.run_relay().await
            }
            Commands::Peer {
                url,
                interval,
                slot,
                file,
            } => {
                if let Some(url) = url {
                    self.config.peer.url = url;
                }
                if let Some(interval) = interval {
                    self.config.peer.interval_ms = interval;
                }
                if let Some(slot) = slot {
                    self.config.peer.slot = slot;
                }
                if file.is_some() {
                    self.config.peer.clipboard_file = file;
                }
                self.config.validate()?;
                self.run_peer().await
            }
            Commands::Config { action } => self.handle_config(action),
        }
    }

    async fn run_relay(&self) -> Result<()> {
        let relay = Arc::new(Relay::with_max_payload(self.config.relay.max_payload));
        let server = RelayServer::bind(&self.config.relay, relay)
            .await
            .context("Failed to start relay")?;

        server
            .run_until(async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;

        Ok(())
    }

    async fn run_peer(&self) -> Result<()> {
        let peer = &self.config.peer;

        let clipboard: Arc<dyn ClipboardProvider> =
            Arc::from(clipboard::create_provider(peer.clipboard_file.as_deref())?);
        info!("Using {} clipboard", clipboard.name());

        info!("Attempting to connect to {}", peer.url);
        let channel = transport::dial(&peer.url)
            .await
            .with_context(|| format!("Dial to {} failed", peer.url))?;

        let reconciler = Reconciler::new(Arc::new(channel), clipboard, peer.sync_config());
        reconciler.run().await?;

        Ok(())
    }

    fn handle_config(&self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                print!("{}", self.config.to_toml()?);
            }
            ConfigAction::Init { force } => {
                let path = Config::default_path()
                    .context("Could not determine the config directory")?;
                Config::write_example(&path, force)?;
                println!("Wrote example configuration to {}", path.display());
            }
        }
        Ok(())
    }
}
