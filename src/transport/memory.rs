//! In-process channel pair
//!
//! Two connected [`MemoryChannel`] endpoints backed by tokio mpsc queues.
//! Lets the relay and the peer be driven without sockets.

use super::{Channel, Result, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};

/// One end of an in-process channel pair
pub struct MemoryChannel {
    send_tx: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    recv_rx: Mutex<mpsc::UnboundedReceiver<Bytes>>,
}

impl MemoryChannel {
    /// Create two endpoints; frames sent on one are received on the other
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        let a = Self {
            send_tx: Mutex::new(Some(a_tx)),
            recv_rx: Mutex::new(b_rx),
        };
        let b = Self {
            send_tx: Mutex::new(Some(b_tx)),
            recv_rx: Mutex::new(a_rx),
        };
        (a, b)
    }

    /// Take the next frame if one is already queued
    pub async fn try_receive(&self) -> Option<Bytes> {
        self.recv_rx.lock().await.try_recv().ok()
    }
}

#[async_trait]
impl Channel for MemoryChannel {
    async fn send(&self, frame: Bytes) -> Result<()> {
        let guard = self.send_tx.lock().await;
        let tx = guard.as_ref().ok_or(TransportError::ConnectionClosed)?;
        tx.send(frame).map_err(|_| TransportError::ConnectionClosed)
    }

    async fn receive(&self) -> Result<Bytes> {
        self.recv_rx
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::ConnectionClosed)
    }

    async fn close(&self) -> Result<()> {
        self.send_tx.lock().await.take();
        Ok(())
    }
}
