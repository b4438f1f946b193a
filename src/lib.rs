//! # ClipRelay
//!
//! Clipboard synchronization through a central relay.
//!
//! A relay process stores the latest value of each named slot and pushes
//! every update to all other connected peers. Peer processes watch their
//! local clipboard, post changes to the relay and apply values pushed back.

pub mod cli;
pub mod clipboard;
pub mod config;
pub mod relay;
pub mod sync;
pub mod transport;

pub use config::Config;

/// Result type alias for ClipRelay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for ClipRelay operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Clipboard operation error
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] clipboard::ClipboardError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] transport::TransportError),

    /// Malformed or oversized request
    #[error("Protocol error: {0}")]
    Protocol(#[from] transport::protocol::ProtocolError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum clipboard payload size (5MB default)
pub const MAX_PAYLOAD_SIZE: usize = 5 * 1024 * 1024;
