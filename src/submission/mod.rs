//! Submission — turning a completed form into backend calls.
//!
//! A flow's `SubmissionPlan` produces requests one at a time, so a later
//! request can use the id returned by an earlier one. The machine stays
//! network-free; the `SubmissionOrchestrator` runs the plan against a
//! `FlowTransport` and reports back.

pub mod http;
pub mod orchestrator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{SubmissionError, TransportError};
use crate::flow::{FlowType, FormState};

pub use http::HttpTransport;
pub use orchestrator::{MAX_SUBMISSION_CALLS, SubmissionOrchestrator};

/// Shown when a flow needs a handoff value that is not there.
pub const MISSING_USER_MESSAGE: &str = "User information not found. Please sign in again.";

/// A user-presentable failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
}

impl ErrorInfo {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Lifecycle of a session's submission.
///
/// NotStarted → InFlight → Succeeded, or InFlight → Failed → InFlight on retry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    NotStarted,
    InFlight,
    Succeeded,
    Failed(ErrorInfo),
}

impl SubmissionStatus {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SubmissionStatus) -> bool {
        use SubmissionStatus::*;
        matches!(
            (self, target),
            (NotStarted, InFlight) | (InFlight, Succeeded) | (InFlight, Failed(_)) | (Failed(_), InFlight)
        )
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }
}

/// One backend call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRequest {
    /// Path relative to the API base URL, e.g. `/auth/signup`.
    pub endpoint: String,
    pub body: serde_json::Value,
}

impl SubmissionRequest {
    pub fn post(endpoint: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            endpoint: endpoint.into(),
            body,
        }
    }
}

/// A successful backend response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// The created entity's id, when the response carries one.
    pub id: Option<String>,
    pub body: serde_json::Value,
}

impl SubmissionOutcome {
    /// Wrap a response body, picking the id from `id`, `user.id` or `user_id`.
    pub fn from_body(body: serde_json::Value) -> Self {
        let id = [&body["id"], &body["user"]["id"], &body["user_id"]]
            .into_iter()
            .find_map(|v| match v {
                serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        Self { id, body }
    }
}

/// Everything a plan may read besides the form.
#[derive(Debug, Clone, Copy)]
pub struct SubmissionContext<'a> {
    pub flow_type: FlowType,
    /// The value read from the flow's handoff slot, if it reads one.
    pub handoff: Option<&'a str>,
    /// Responses of the calls already made, in order.
    pub completed: &'a [SubmissionOutcome],
}

/// Produces the next request, or `None` once every call has been made.
pub type SubmissionPlan =
    fn(&FormState, &SubmissionContext<'_>) -> Result<Option<SubmissionRequest>, SubmissionError>;

/// Sends submission requests to the backend.
#[async_trait]
pub trait FlowTransport: Send + Sync {
    async fn send(
        &self,
        flow: FlowType,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome, TransportError>;
}
