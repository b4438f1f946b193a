//! Local clipboard access for peers
//!
//! The peer reads its local value from, and writes relay pushes to, a
//! [`ClipboardProvider`]. Two providers exist: the system clipboard and a
//! plain file for headless machines.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

pub mod file;
pub mod system;

pub use file::FileClipboard;
pub use system::SystemClipboard;

/// Clipboard provider trait
#[async_trait]
pub trait ClipboardProvider: Send + Sync {
    /// Current clipboard text
    async fn read(&self) -> Result<String, ClipboardError>;

    /// Replace the clipboard text
    async fn write(&self, value: &str) -> Result<(), ClipboardError>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// Clipboard errors
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Platform-specific error
    #[error("Platform error: {0}")]
    Platform(String),

    /// Clipboard holds nothing readable as text
    #[error("No clipboard text available")]
    NoContent,

    /// The clipboard worker is gone
    #[error("Clipboard unavailable")]
    Unavailable,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Pick the provider for this peer
///
/// A configured file wins over the system clipboard.
pub fn create_provider(file: Option<&Path>) -> Result<Box<dyn ClipboardProvider>, ClipboardError> {
    match file {
        Some(path) => Ok(Box::new(FileClipboard::new(path))),
        None => Ok(Box::new(SystemClipboard::new()?)),
    }
}
