//! The concrete wizards.

pub mod employer_signup;
pub mod job_seeker_onboarding;
pub mod job_seeker_signup;

use std::sync::Arc;

use crate::error::DefinitionError;
use crate::flow::{FlowDefinition, FlowType};

/// Build the definition for `flow_type`.
pub fn definition(flow_type: FlowType) -> Result<Arc<FlowDefinition>, DefinitionError> {
    let definition = match flow_type {
        FlowType::JobSeekerSignup => job_seeker_signup::definition()?,
        FlowType::EmployerSignup => employer_signup::definition()?,
        FlowType::JobSeekerOnboarding => job_seeker_onboarding::definition()?,
    };
    Ok(Arc::new(definition))
}
