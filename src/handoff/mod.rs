//! Cross-flow handoff — small values one flow leaves for the next.
//!
//! Signup writes the new user's id; onboarding reads it to build its payload
//! and consumes it once the profile is saved.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HandoffError;
use crate::flow::FlowType;

pub use file::FileHandoffStore;
pub use memory::MemoryHandoffStore;

/// Well-known handoff slots.
pub mod keys {
    /// Id of the user created by a signup flow.
    pub const SIGNUP_USER_ID: &str = "signup_user_id";
}

/// A value in one handoff slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffValue {
    pub value: String,
    pub written_by: FlowType,
    pub written_at: DateTime<Utc>,
}

impl HandoffValue {
    pub fn new(value: impl Into<String>, written_by: FlowType) -> Self {
        Self {
            value: value.into(),
            written_by,
            written_at: Utc::now(),
        }
    }
}

/// Keyed storage that outlives a single flow session.
#[async_trait]
pub trait HandoffStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn write_handoff(&self, key: &str, value: HandoffValue) -> Result<(), HandoffError>;

    /// Read the value under `key` without removing it.
    async fn read_handoff(&self, key: &str) -> Result<Option<HandoffValue>, HandoffError>;

    /// Remove and return the value under `key`.
    async fn take_handoff(&self, key: &str) -> Result<Option<HandoffValue>, HandoffError>;
}
