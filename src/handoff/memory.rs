//! In-process handoff store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::HandoffError;

use super::{HandoffStore, HandoffValue};

/// Handoff slots held in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct MemoryHandoffStore {
    slots: RwLock<HashMap<String, HandoffValue>>,
}

impl MemoryHandoffStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HandoffStore for MemoryHandoffStore {
    async fn write_handoff(&self, key: &str, value: HandoffValue) -> Result<(), HandoffError> {
        self.slots.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn read_handoff(&self, key: &str) -> Result<Option<HandoffValue>, HandoffError> {
        Ok(self.slots.read().await.get(key).cloned())
    }

    async fn take_handoff(&self, key: &str) -> Result<Option<HandoffValue>, HandoffError> {
        Ok(self.slots.write().await.remove(key))
    }
}
