//! Relay server listener
//!
//! Accepts TCP connections, upgrades them to WebSockets and serves each one
//! on its own task.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};

use super::Relay;
use crate::config::RelayConfig;
use crate::transport::websocket::PendingUpgrade;
use crate::transport::{Channel, WebSocketListener};

/// WebSocket front end for a [`Relay`]
pub struct RelayServer {
    relay: Arc<Relay>,
    listener: WebSocketListener,
}

impl RelayServer {
    /// Bind the listener described by `config`
    pub async fn bind(config: &RelayConfig, relay: Arc<Relay>) -> crate::Result<Self> {
        let addr = config.socket_addr()?;
        let listener = WebSocketListener::bind(addr, config.path.clone())
            .await?
            .with_max_message_size(config.max_payload);

        info!(
            "Hosting relay on ws://{}{}",
            listener.local_addr()?,
            config.path
        );

        Ok(Self { relay, listener })
    }

    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `shutdown` resolves
    ///
    /// Connections still open at that point are listed in the log; their
    /// tasks are not waited for.
    pub async fn run_until<F>(self, shutdown: F) -> crate::Result<()>
    where
        F: Future<Output = ()>,
    {
        let result = tokio::select! {
            _ = shutdown => {
                info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop() => result,
        };

        self.log_open_connections().await;
        result
    }

    async fn log_open_connections(&self) {
        let now = Utc::now();
        for conn in self.relay.hub().connections().await {
            let connected_secs = (now - conn.connected_at).num_seconds();
            info!(connection = %conn.id, connected_secs, "Connection still open");
        }
    }

    async fn accept_loop(&self) -> crate::Result<()> {
        loop {
            match self.listener.accept().await {
                Ok(pending) => {
                    let relay = Arc::clone(&self.relay);
                    tokio::spawn(handle_connection(relay, pending));
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

async fn handle_connection(relay: Arc<Relay>, pending: PendingUpgrade) {
    let remote_addr = pending.remote_addr();

    let channel = match pending.upgrade().await {
        Ok(channel) => channel,
        Err(e) => {
            debug!(remote = %remote_addr, "WebSocket upgrade failed: {}", e);
            return;
        }
    };

    let channel: Arc<dyn Channel> = Arc::new(channel);
    // Errors are logged by serve_connection; they only end this peer
    let _ = relay.serve_connection(channel).await;
}
