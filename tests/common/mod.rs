//! Shared helpers for integration tests

#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::RwLock;
use tokio::time::{sleep, timeout, Instant};

use cliprelay::clipboard::{ClipboardError, ClipboardProvider};
use cliprelay::transport::Channel;

/// In-memory clipboard with switchable failures
pub struct MockClipboard {
    content: RwLock<String>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl MockClipboard {
    pub fn new(initial: &str) -> Self {
        Self {
            content: RwLock::new(initial.to_string()),
            writes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Simulate the user copying something
    pub async fn copy(&self, text: &str) {
        *self.content.write().await = text.to_string();
    }

    pub async fn value(&self) -> String {
        self.content.read().await.clone()
    }

    /// Number of successful writes made by the reconciler
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ClipboardProvider for MockClipboard {
    async fn read(&self) -> Result<String, ClipboardError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(ClipboardError::Platform("read refused".to_string()));
        }
        Ok(self.content.read().await.clone())
    }

    async fn write(&self, value: &str) -> Result<(), ClipboardError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(ClipboardError::Platform("write refused".to_string()));
        }
        *self.content.write().await = value.to_string();
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Next frame, failing the test after two seconds
pub async fn recv(channel: &dyn Channel) -> Bytes {
    timeout(Duration::from_secs(2), channel.receive())
        .await
        .expect("timed out waiting for a frame")
        .expect("channel closed")
}

/// True if nothing arrives within `window`
pub async fn stays_silent(channel: &dyn Channel, window: Duration) -> bool {
    timeout(window, channel.receive()).await.is_err()
}

/// Poll `check` until it returns true or two seconds pass
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if check().await {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}
