//! Error types for jobflow.

use std::time::Duration;

use crate::flow::{FieldKey, FlowPhase, InterstitialId, Resolution, StepId};

/// Top-level error type for the flow controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Flow definition error: {0}")]
    Definition(#[from] DefinitionError),

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Handoff error: {0}")]
    Handoff(#[from] HandoffError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Authoring defects in a step table or interstitial table.
///
/// These are raised by `FlowDefinitionBuilder::build` and never at runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    #[error("Flow {flow} has no steps")]
    EmptyTable { flow: String },

    #[error("Step {step} is declared more than once or out of order")]
    DuplicateStep { step: StepId },

    #[error("Step {step} can never be reached: {reason}")]
    UnreachableStep { step: StepId, reason: String },

    #[error("Interstitial {interstitial} is misconfigured: {reason}")]
    InterstitialMisconfiguration {
        interstitial: InterstitialId,
        reason: String,
    },

    #[error("Field {field} is not declared on step {step}")]
    UnknownField { step: StepId, field: FieldKey },

    #[error("Field {field} is not declared on any step")]
    UndeclaredField { field: FieldKey },

    #[error("Invalid pattern for field {field}: {reason}")]
    InvalidPattern { field: FieldKey, reason: String },
}

/// A dispatched event that the machine refused.
///
/// Refusals leave the session untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("Cannot apply {event} while {phase}")]
    InvalidTransition { phase: FlowPhase, event: String },

    #[error("Step {step} is not part of this flow")]
    UnknownStep { step: StepId },

    #[error("Interstitial {interstitial} has no resolution {resolution:?}")]
    InvalidResolution {
        interstitial: InterstitialId,
        resolution: Resolution,
    },

    #[error("Field {field} cannot be edited on step {step}")]
    FieldNotOnStep { step: StepId, field: FieldKey },

    #[error("Developer skip is disabled")]
    DevSkipDisabled,

    #[error("A submission is in flight")]
    SubmissionInFlight,
}

/// Transport-level failures reported by a `FlowTransport`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Backend returned status {code}")]
    Status { code: u16, detail: Option<String> },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),
}

/// Submission failures, before they are projected to an `ErrorInfo`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    #[error("Handoff value {key} is missing")]
    MissingHandoff { key: String },

    #[error("Could not build submission payload: {0}")]
    Payload(String),

    #[error("Submission plan exceeded {max} calls")]
    TooManyCalls { max: usize },

    #[error("Handoff store failed: {0}")]
    Handoff(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Handoff persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum HandoffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;
