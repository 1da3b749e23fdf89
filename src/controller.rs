//! Flow controller — a machine wired to its transport and handoff store.
//!
//! Hosts dispatch events here instead of on the bare machine; when an event
//! enters `Submitting`, the submission runs before `dispatch` returns.

use std::sync::Arc;

use tracing::info;

use crate::config::FlowConfig;
use crate::error::{Error, TransitionError};
use crate::flow::{
    Effect, FlowDefinition, FlowEvent, FlowMachine, FlowSession, GateResult, Transition,
};
use crate::handoff::{FileHandoffStore, HandoffStore};
use crate::submission::{FlowTransport, HttpTransport, SubmissionOrchestrator};

pub struct FlowController {
    machine: FlowMachine,
    orchestrator: SubmissionOrchestrator,
}

impl FlowController {
    pub fn new(
        definition: Arc<FlowDefinition>,
        config: &FlowConfig,
        transport: Arc<dyn FlowTransport>,
        handoff: Arc<dyn HandoffStore>,
    ) -> Self {
        Self {
            machine: FlowMachine::new(definition, config),
            orchestrator: SubmissionOrchestrator::new(
                transport,
                handoff,
                config.generic_failure_message.clone(),
            ),
        }
    }

    /// Controller backed by the HTTP transport and the file handoff store.
    pub fn from_config(definition: Arc<FlowDefinition>, config: &FlowConfig) -> Result<Self, Error> {
        let transport = Arc::new(HttpTransport::new(config)?);
        let handoff = Arc::new(FileHandoffStore::new(config.handoff_path.clone()));
        Ok(Self::new(definition, config, transport, handoff))
    }

    /// Apply an event. If it starts a submission, the returned transition
    /// spans from the pre-submit phase to `Completed` or back to `Editing`.
    pub async fn dispatch(&mut self, event: FlowEvent) -> Result<Transition, TransitionError> {
        let transition = self.machine.dispatch(event)?;
        if transition.effect != Some(Effect::Submit) {
            return Ok(transition);
        }

        let settled = self.orchestrator.run(&mut self.machine).await?;
        info!(
            session_id = %self.machine.session().id(),
            flow = %self.machine.session().flow_type(),
            outcome = %settled.to,
            "Submission settled"
        );
        Ok(Transition {
            from: transition.from,
            to: settled.to,
            effect: None,
            intent: settled.intent,
        })
    }

    pub fn session(&self) -> &FlowSession {
        self.machine.session()
    }

    pub fn machine(&self) -> &FlowMachine {
        &self.machine
    }

    pub fn gate(&self) -> Option<GateResult> {
        self.machine.gate()
    }
}
