//! Relay side of clipboard synchronization
//!
//! The relay keeps the latest value of every named slot and pushes updates
//! from one peer to all the others. State is owned by explicitly constructed
//! [`Registry`] and [`Hub`] instances shared through `Arc`.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

pub mod dispatcher;
pub mod hub;
pub mod registry;
pub mod server;

pub use dispatcher::{Dispatcher, Outcome};
pub use hub::{ConnectionInfo, Hub};
pub use registry::Registry;
pub use server::RelayServer;

use crate::transport::protocol::check_frame_size;
use crate::transport::{Channel, ConnectionId, Request, TransportError};

/// Serves peer connections against one registry and hub
pub struct Relay {
    registry: Arc<Registry>,
    hub: Arc<Hub>,
    dispatcher: Dispatcher,
    max_payload: usize,
}

impl Relay {
    pub fn new(registry: Arc<Registry>, hub: Arc<Hub>, max_payload: usize) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&hub));

        Self {
            registry,
            hub,
            dispatcher,
            max_payload,
        }
    }

    /// Relay with fresh, empty state
    pub fn with_max_payload(max_payload: usize) -> Self {
        Self::new(Arc::new(Registry::new()), Arc::new(Hub::new()), max_payload)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Run one connection until it closes or misbehaves
    ///
    /// The connection is registered for the whole read loop and unregistered
    /// before this returns. A clean close yields `Ok(())`; read errors and
    /// malformed frames are returned after cleanup.
    pub async fn serve_connection(&self, channel: Arc<dyn Channel>) -> crate::Result<()> {
        let id = Uuid::new_v4();

        self.hub.register(id, Arc::clone(&channel)).await;
        let peers = self.hub.len().await;
        let slots = self.registry.len().await;
        info!(connection = %id, peers, slots, "Peer connected");

        let result = self.read_loop(id, channel.as_ref()).await;

        self.hub.unregister(id).await;
        let _ = channel.close().await;

        let peers = self.hub.len().await;
        let slot_names = self.registry.slot_names().await;
        match &result {
            Ok(()) => info!(connection = %id, peers, slots = ?slot_names, "Peer disconnected"),
            Err(e) => warn!(connection = %id, peers, slots = ?slot_names, "Dropping peer: {}", e),
        }

        result
    }

    async fn read_loop(&self, id: ConnectionId, channel: &dyn Channel) -> crate::Result<()> {
        loop {
            let frame = match channel.receive().await {
                Ok(frame) => frame,
                Err(TransportError::ConnectionClosed) => return Ok(()),
                Err(e) => return Err(e.into()),
            };

            check_frame_size(frame.len(), self.max_payload)?;
            let request = Request::decode(&frame)?;

            self.dispatcher.dispatch(id, request).await;
        }
    }
}
