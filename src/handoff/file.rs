//! File-backed handoff store.
//!
//! All slots live in one JSON object on disk so a value written by signup
//! survives an app restart before onboarding runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::HandoffError;

use super::{HandoffStore, HandoffValue};

type Slots = HashMap<String, HandoffValue>;

/// Handoff slots persisted to a JSON file.
pub struct FileHandoffStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl FileHandoffStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Slots, HandoffError> {
        if !self.path.exists() {
            return Ok(Slots::new());
        }
        let content = fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Slots::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    async fn save(&self, slots: &Slots) -> Result<(), HandoffError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(slots)?;
        fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl HandoffStore for FileHandoffStore {
    async fn write_handoff(&self, key: &str, value: HandoffValue) -> Result<(), HandoffError> {
        let _guard = self.lock.lock().await;
        let mut slots = self.load().await?;
        slots.insert(key.to_string(), value);
        self.save(&slots).await?;
        debug!(key, path = %self.path.display(), "Handoff written");
        Ok(())
    }

    async fn read_handoff(&self, key: &str) -> Result<Option<HandoffValue>, HandoffError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.remove(key))
    }

    async fn take_handoff(&self, key: &str) -> Result<Option<HandoffValue>, HandoffError> {
        let _guard = self.lock.lock().await;
        let mut slots = self.load().await?;
        let taken = slots.remove(key);
        if taken.is_some() {
            self.save(&slots).await?;
            debug!(key, path = %self.path.display(), "Handoff consumed");
        }
        Ok(taken)
    }
}
