//! Peer-side clipboard reconciliation
//!
//! A [`Reconciler`] keeps the local clipboard and the relay's slot in step.
//! A receive task blocks on the channel and forwards every pushed value over
//! an internal queue to the reconcile task, which owns the cached value and
//! also runs the poll timer. Because only that task touches the cache, a
//! value applied from the relay is always cached before the next poll looks
//! at the clipboard, so it is never mistaken for a local change.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::clipboard::{ClipboardError, ClipboardProvider};
use crate::transport::{Channel, Request, TransportError, DEFAULT_SLOT};

/// Poll interval used when none (or zero) is configured
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);

const PREVIEW_CHARS: usize = 40;

/// Reconciler settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Slot this peer reads and writes
    pub slot: String,
    /// Delay between local clipboard checks
    pub interval: Duration,
    /// Local values whose encoded request exceeds this are not sent
    pub max_payload: usize,
}

impl SyncConfig {
    /// Build from a millisecond interval; `0` means the default
    pub fn new(slot: impl Into<String>, interval_ms: u64) -> Self {
        let interval = if interval_ms == 0 {
            DEFAULT_POLL_INTERVAL
        } else {
            Duration::from_millis(interval_ms)
        };

        Self {
            slot: slot.into(),
            interval,
            max_payload: crate::MAX_PAYLOAD_SIZE,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT, 0)
    }
}

/// Lifecycle of a peer connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    /// Channel open, cache not seeded yet
    Connecting,
    /// Cache seeded and GET sent
    Primed,
    /// Poll and receive loops running
    Syncing,
}

/// Keeps one peer's clipboard consistent with the relay
pub struct Reconciler {
    channel: Arc<dyn Channel>,
    clipboard: Arc<dyn ClipboardProvider>,
    config: SyncConfig,
    cache: String,
    state: PeerState,
}

impl Reconciler {
    pub fn new(
        channel: Arc<dyn Channel>,
        clipboard: Arc<dyn ClipboardProvider>,
        config: SyncConfig,
    ) -> Self {
        Self {
            channel,
            clipboard,
            config,
            cache: String::new(),
            state: PeerState::Connecting,
        }
    }

    /// Prime from the relay and sync until the channel closes
    ///
    /// Returns `Ok(())` when the relay closes the connection cleanly. Any
    /// other transport failure is returned; there is no reconnect.
    pub async fn run(mut self) -> crate::Result<()> {
        self.prime().await?;

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let receiver = tokio::spawn(receive_loop(Arc::clone(&self.channel), inbound_tx));

        self.transition(PeerState::Syncing);
        let reconciled = self.reconcile_loop(inbound_rx).await;

        if reconciled.is_err() {
            receiver.abort();
            return reconciled;
        }

        match receiver.await {
            Ok(Ok(())) => {
                info!("Relay closed the connection");
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(e) => Err(crate::Error::Other(format!("receive task failed: {}", e))),
        }
    }

    /// Seed the cache from the local clipboard and ask the relay for its copy
    async fn prime(&mut self) -> crate::Result<()> {
        self.cache = match self.clipboard.read().await {
            Ok(value) => value,
            Err(e) => {
                debug!("No initial clipboard value: {}", e);
                String::new()
            }
        };

        let frame = Request::get(&self.config.slot).encode()?;
        self.channel.send(frame).await?;

        self.transition(PeerState::Primed);
        Ok(())
    }

    async fn reconcile_loop(
        &mut self,
        mut inbound: mpsc::UnboundedReceiver<Bytes>,
    ) -> crate::Result<()> {
        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                frame = inbound.recv() => match frame {
                    Some(frame) => self.apply_remote(frame).await,
                    None => return Ok(()),
                },
                _ = ticker.tick() => self.poll_local().await?,
            }
        }
    }

    /// Send the local clipboard to the relay if it changed since last seen
    async fn poll_local(&mut self) -> crate::Result<()> {
        let current = match self.clipboard.read().await {
            Ok(value) => value,
            Err(ClipboardError::NoContent) => {
                trace!("Clipboard holds no text");
                return Ok(());
            }
            Err(e) => {
                warn!("Failed to read clipboard: {}", e);
                return Ok(());
            }
        };

        if current == self.cache {
            return Ok(());
        }

        // The relay limits the whole frame, so measure after encoding
        let frame = Request::post(&self.config.slot, current.as_str()).encode()?;
        if frame.len() > self.config.max_payload {
            warn!(
                size = frame.len(),
                max = self.config.max_payload,
                "Clipboard value too large to sync, skipping"
            );
            // Remember it so the warning is not repeated every tick
            self.cache = current;
            return Ok(());
        }

        self.channel.send(frame).await?;
        debug!(slot = %self.config.slot, value = %preview(&current), "Posted clipboard change");

        self.cache = current;
        Ok(())
    }

    /// Write a relay push to the local clipboard and cache it
    async fn apply_remote(&mut self, frame: Bytes) {
        let value = String::from_utf8_lossy(&frame).into_owned();

        if value == self.cache {
            trace!("Relay value already current");
            return;
        }

        if let Err(e) = self.clipboard.write(&value).await {
            warn!("Failed to write to clipboard: {}", e);
            return;
        }

        debug!(value = %preview(&value), "Updated clipboard");
        self.cache = value;
    }

    fn transition(&mut self, next: PeerState) {
        debug!(from = ?self.state, to = ?next, "Peer state change");
        self.state = next;
    }
}

/// Forward inbound frames until the channel fails or the reconciler is gone
async fn receive_loop(
    channel: Arc<dyn Channel>,
    inbound: mpsc::UnboundedSender<Bytes>,
) -> Result<(), TransportError> {
    loop {
        match channel.receive().await {
            Ok(frame) => {
                if inbound.send(frame).is_err() {
                    return Ok(());
                }
            }
            Err(TransportError::ConnectionClosed) => return Ok(()),
            Err(e) => {
                warn!("Read error: {}", e);
                return Err(e);
            }
        }
    }
}

/// First few characters of a value, for logs
fn preview(value: &str) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
