//! Generic multi-step flow engine.
//!
//! A `FlowDefinition` is a validated step table plus interstitials. A
//! `FlowMachine` runs one session through it, one `FlowEvent` at a time.

pub mod definition;
pub mod form;
pub mod interstitial;
pub mod machine;
pub mod step;
pub mod validation;

pub use definition::{
    CheckboxGroup, FlowDefinition, FlowDefinitionBuilder, FlowType, ListToggle, Normalize, Preset,
    Waiver,
};
pub use form::{FieldKey, FieldValue, FormState};
pub use interstitial::{
    InterstitialDescriptor, InterstitialId, InterstitialKind, InterstitialScheduler, Resolution,
    ResolutionTarget,
};
pub use machine::{
    Effect, FlowEvent, FlowMachine, FlowPhase, FlowSession, NavigationIntent, Transition,
};
pub use step::{Branch, Condition, StepDescriptor, StepId};
pub use validation::{FieldError, GateResult, REQUIRED_MESSAGE, Rule, validate};
