//! Named value registry
//!
//! Stores the latest value of every slot. The outer lock only guards the set
//! of slot names; each slot carries its own lock, so writers to different
//! slots never wait on each other.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::debug;

/// One named storage cell
#[derive(Debug)]
struct Slot {
    value: Bytes,
}

/// Concurrent map of slot name to current value
#[derive(Debug, Default)]
pub struct Registry {
    slots: RwLock<HashMap<String, Arc<RwLock<Slot>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `name`
    ///
    /// Returns the value now stored and whether this call created the slot.
    pub async fn set_value(&self, name: &str, data: Bytes) -> (Bytes, bool) {
        if let Some(slot) = self.slot(name).await {
            let mut slot = slot.write().await;
            slot.value = data.clone();
            return (data, false);
        }

        let mut slots = self.slots.write().await;

        // Another writer may have created it between the two locks
        if let Some(slot) = slots.get(name) {
            let slot = Arc::clone(slot);
            drop(slots);
            slot.write().await.value = data.clone();
            return (data, false);
        }

        slots.insert(
            name.to_string(),
            Arc::new(RwLock::new(Slot {
                value: data.clone(),
            })),
        );
        debug!(slot = %name, "Created slot");

        (data, true)
    }

    /// Current value of `name`, if the slot exists
    pub async fn get_value(&self, name: &str) -> Option<Bytes> {
        let slot = self.slot(name).await?;
        let value = slot.read().await.value.clone();
        Some(value)
    }

    /// Number of slots
    pub async fn len(&self) -> usize {
        self.slots.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.read().await.is_empty()
    }

    /// Names of all slots, sorted
    pub async fn slot_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Clone the slot handle and release the name lock immediately
    async fn slot(&self, name: &str) -> Option<Arc<RwLock<Slot>>> {
        self.slots.read().await.get(name).cloned()
    }
}
