//! Runs a flow's submission plan and feeds the result back into its machine.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{SubmissionError, TransitionError, TransportError};
use crate::flow::{FlowMachine, Transition};
use crate::handoff::{HandoffStore, HandoffValue};

use super::{ErrorInfo, FlowTransport, MISSING_USER_MESSAGE, SubmissionContext, SubmissionOutcome};

/// Upper bound on calls per submission, so a plan that never returns `None`
/// cannot loop forever.
pub const MAX_SUBMISSION_CALLS: usize = 8;

/// Executes `Effect::Submit` for a machine.
pub struct SubmissionOrchestrator {
    transport: Arc<dyn FlowTransport>,
    handoff: Arc<dyn HandoffStore>,
    fallback_message: String,
}

impl SubmissionOrchestrator {
    pub fn new(
        transport: Arc<dyn FlowTransport>,
        handoff: Arc<dyn HandoffStore>,
        fallback_message: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            handoff,
            fallback_message: fallback_message.into(),
        }
    }

    /// Submit the machine's form and complete its submission.
    ///
    /// Calls that succeeded in an earlier attempt are not repeated.
    pub async fn run(&self, machine: &mut FlowMachine) -> Result<Transition, TransitionError> {
        let result = match self.execute(machine).await {
            Ok(outcome) => {
                self.settle_handoff(machine).await;
                Ok(outcome)
            }
            Err(e) => {
                warn!(
                    session_id = %machine.session().id(),
                    flow = %machine.session().flow_type(),
                    error = %e,
                    "Submission attempt failed"
                );
                Err(self.error_info(&e))
            }
        };
        machine.complete_submission(result)
    }

    async fn execute(
        &self,
        machine: &mut FlowMachine,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let flow_type = machine.session().flow_type();
        let plan = machine.definition().plan();

        let handoff = match machine.definition().reads_handoff() {
            Some(key) => Some(self.read_required(key).await?),
            None => None,
        };

        loop {
            let session = machine.session();
            let made = session.completed_requests().len();
            let ctx = SubmissionContext {
                flow_type,
                handoff: handoff.as_ref().map(|h| h.value.as_str()),
                completed: session.completed_requests(),
            };
            let Some(request) = plan(session.form(), &ctx)? else {
                break;
            };
            if made >= MAX_SUBMISSION_CALLS {
                return Err(SubmissionError::TooManyCalls {
                    max: MAX_SUBMISSION_CALLS,
                });
            }

            info!(
                session_id = %session.id(),
                flow = %flow_type,
                endpoint = %request.endpoint,
                call = made + 1,
                "Sending submission request"
            );
            let outcome = self.transport.send(flow_type, &request).await?;
            machine.record_request(outcome);
        }

        Ok(machine
            .session()
            .completed_requests()
            .last()
            .cloned()
            .unwrap_or_default())
    }

    async fn read_required(&self, key: &str) -> Result<HandoffValue, SubmissionError> {
        self.handoff
            .read_handoff(key)
            .await
            .map_err(|e| SubmissionError::Handoff(e.to_string()))?
            .ok_or_else(|| SubmissionError::MissingHandoff {
                key: key.to_string(),
            })
    }

    /// Write the created id for the next flow and consume what this flow read.
    /// Failures here are logged; the backend already accepted the submission.
    async fn settle_handoff(&self, machine: &FlowMachine) {
        let session = machine.session();
        let definition = machine.definition();

        if let Some(key) = definition.writes_handoff() {
            match session.completed_requests().first().and_then(|o| o.id.clone()) {
                Some(id) => {
                    let value = HandoffValue::new(id, session.flow_type());
                    if let Err(e) = self.handoff.write_handoff(key, value).await {
                        warn!(key, error = %e, "Failed to write handoff");
                    }
                }
                None => warn!(key, "Submission response carried no id to hand off"),
            }
        }

        if let Some(key) = definition.reads_handoff()
            && let Err(e) = self.handoff.take_handoff(key).await
        {
            warn!(key, error = %e, "Failed to consume handoff");
        }
    }

    /// Project a failure to the message shown on the terminal step.
    pub fn error_info(&self, error: &SubmissionError) -> ErrorInfo {
        match error {
            SubmissionError::Transport(TransportError::Status {
                detail: Some(detail),
                ..
            }) => ErrorInfo::new(detail.clone()),
            SubmissionError::MissingHandoff { .. } => ErrorInfo::new(MISSING_USER_MESSAGE),
            _ => ErrorInfo::new(self.fallback_message.clone()),
        }
    }
}

