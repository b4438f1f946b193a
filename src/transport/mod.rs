//! Network transport layer for clipboard relaying
//!
//! This module defines the [`Channel`] abstraction shared by the relay and
//! the peer, the wire protocol spoken over it, and the concrete channel
//! implementations (WebSocket and in-process).

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

pub mod memory;
pub mod protocol;
pub mod websocket;

pub use memory::MemoryChannel;
pub use protocol::{Request, RequestKind, DEFAULT_SLOT};
pub use websocket::{dial, WebSocketChannel, WebSocketListener};

/// Identity of one accepted connection, unique for the relay's lifetime
pub type ConnectionId = Uuid;

/// Transport layer errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// WebSocket protocol or handshake error
    #[error("WebSocket error: {message}")]
    WebSocket { message: String },

    /// The remote side closed the channel or it was closed locally
    #[error("Connection closed")]
    ConnectionClosed,

    /// The peer URL could not be used for dialing
    #[error("Invalid relay URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;

        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => TransportError::ConnectionClosed,
            WsError::Io(e) => TransportError::Io(e),
            other => TransportError::WebSocket {
                message: other.to_string(),
            },
        }
    }
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Bidirectional message channel to one remote endpoint
///
/// Sending and receiving take `&self` so a channel can be shared between the
/// task blocked in [`Channel::receive`] and whoever needs to push frames to
/// it (the relay hub, the peer's reconcile loop).
#[async_trait]
pub trait Channel: Send + Sync {
    /// Queue one frame for delivery
    async fn send(&self, frame: Bytes) -> Result<()>;

    /// Wait for the next inbound frame
    ///
    /// Returns [`TransportError::ConnectionClosed`] once the remote side is
    /// gone. Only one task should be receiving at a time.
    async fn receive(&self) -> Result<Bytes>;

    /// Close the channel; further sends fail
    async fn close(&self) -> Result<()>;
}
