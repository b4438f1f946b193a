//! Connection hub
//!
//! Tracks every registered connection by id and fans frames out to them.
//! Membership changes take the lock exclusively; broadcast and unicast only
//! hold it in shared mode long enough to pick their recipients, so sends
//! never happen under the lock.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::transport::{Channel, ConnectionId};

struct Member {
    channel: Arc<dyn Channel>,
    connected_at: DateTime<Utc>,
}

/// Snapshot of one registered connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub connected_at: DateTime<Utc>,
}

/// Set of live connections plus broadcast/unicast over them
#[derive(Default)]
pub struct Hub {
    members: RwLock<HashMap<ConnectionId, Member>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `channel` addressable as `id`
    pub async fn register(&self, id: ConnectionId, channel: Arc<dyn Channel>) {
        let mut members = self.members.write().await;
        members.insert(
            id,
            Member {
                channel,
                connected_at: Utc::now(),
            },
        );
        debug!(connection = %id, total = members.len(), "Registered connection");
    }

    /// Remove `id`; returns whether it was registered
    ///
    /// Unregistering an unknown id is a no-op.
    pub async fn unregister(&self, id: ConnectionId) -> bool {
        let mut members = self.members.write().await;
        let removed = members.remove(&id).is_some();
        if removed {
            debug!(connection = %id, total = members.len(), "Unregistered connection");
        }
        removed
    }

    /// Send `payload` to every connection except `sender`
    ///
    /// A failed send is logged and skipped. Returns how many recipients the
    /// payload was handed to.
    pub async fn broadcast_from(&self, sender: ConnectionId, payload: Bytes) -> usize {
        let recipients: Vec<(ConnectionId, Arc<dyn Channel>)> = {
            let members = self.members.read().await;
            members
                .iter()
                .filter(|(id, _)| **id != sender)
                .map(|(id, member)| (*id, Arc::clone(&member.channel)))
                .collect()
        };

        let mut delivered = 0;
        for (id, channel) in recipients {
            match channel.send(payload.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(connection = %id, "Error broadcasting: {}", e),
            }
        }

        delivered
    }

    /// Send `payload` to `target` only
    ///
    /// Returns `false` without error if `target` is no longer registered or
    /// the send failed.
    pub async fn respond_to(&self, target: ConnectionId, payload: Bytes) -> bool {
        let channel = {
            let members = self.members.read().await;
            match members.get(&target) {
                Some(member) => Arc::clone(&member.channel),
                None => {
                    debug!(connection = %target, "Response target is gone");
                    return false;
                }
            }
        };

        match channel.send(payload).await {
            Ok(()) => true,
            Err(e) => {
                warn!(connection = %target, "Error responding: {}", e);
                false
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Registered connections, oldest first
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> = self
            .members
            .read()
            .await
            .iter()
            .map(|(id, member)| ConnectionInfo {
                id: *id,
                connected_at: member.connected_at,
            })
            .collect();
        infos.sort_by_key(|info| info.connected_at);
        infos
    }
}
