//! File-backed clipboard
//!
//! Treats the contents of a file as the clipboard. The file is only re-read
//! when its modification time or size changes.

use super::{ClipboardError, ClipboardProvider};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::trace;

#[derive(Debug, Default)]
struct Snapshot {
    modified: Option<SystemTime>,
    len: u64,
    contents: String,
}

/// Clipboard provider backed by a file
pub struct FileClipboard {
    path: PathBuf,
    snapshot: Mutex<Snapshot>,
}

impl FileClipboard {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            snapshot: Mutex::new(Snapshot::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ClipboardProvider for FileClipboard {
    async fn read(&self) -> Result<String, ClipboardError> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        let modified = metadata.modified()?;

        let mut snapshot = self.snapshot.lock().await;
        if snapshot.modified != Some(modified) || snapshot.len != metadata.len() {
            trace!(path = %self.path.display(), "Clipboard file changed, re-reading");
            snapshot.contents = tokio::fs::read_to_string(&self.path).await?;
            snapshot.modified = Some(modified);
            snapshot.len = metadata.len();
        }

        Ok(snapshot.contents.clone())
    }

    async fn write(&self, value: &str) -> Result<(), ClipboardError> {
        let mut snapshot = self.snapshot.lock().await;
        tokio::fs::write(&self.path, value).await?;

        let metadata = tokio::fs::metadata(&self.path).await?;
        snapshot.modified = Some(metadata.modified()?);
        snapshot.len = metadata.len();
        snapshot.contents = value.to_string();
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}
