//! The flow machine — one session's position, form, and submission status.
//!
//! Every user intent arrives as a `FlowEvent`. The machine either applies it and
//! returns the resulting `Transition`, or refuses it with a `TransitionError`
//! and leaves the session untouched. Network work is never done here: entering
//! `Submitting` yields `Effect::Submit` for the caller to run.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FlowConfig;
use crate::error::TransitionError;
use crate::submission::{ErrorInfo, SubmissionOutcome, SubmissionStatus};

use super::definition::{FlowDefinition, FlowType};
use super::form::{FieldKey, FieldValue, FormState};
use super::interstitial::{InterstitialId, Resolution, ResolutionTarget};
use super::step::StepId;
use super::validation::{FieldError, GateResult};

/// Where a session currently is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "at", rename_all = "snake_case")]
pub enum FlowPhase {
    Editing(StepId),
    AwaitingInterstitial(InterstitialId),
    Submitting,
    Completed,
    Abandoned,
    /// The user picked a path handled by another flow type.
    Branched(FlowType),
}

impl FlowPhase {
    /// Whether no further event can move the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned | Self::Branched(_))
    }
}

impl fmt::Display for FlowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Editing(step) => write!(f, "editing step {step}"),
            Self::AwaitingInterstitial(id) => write!(f, "awaiting interstitial {id}"),
            Self::Submitting => write!(f, "submitting"),
            Self::Completed => write!(f, "completed"),
            Self::Abandoned => write!(f, "abandoned"),
            Self::Branched(flow) => write!(f, "branched to {flow}"),
        }
    }
}

/// A user intent dispatched to the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowEvent {
    Edit { field: FieldKey, value: FieldValue },
    Advance,
    Retreat,
    /// Return to an earlier, reachable step (e.g. "edit" from a summary).
    JumpTo(StepId),
    Resolve(Resolution),
    /// The overlay was closed without choosing a button.
    DismissInterstitial,
    /// Fill the current step with placeholder values and advance.
    DevSkip,
    Abandon,
}

impl FlowEvent {
    pub fn edit(field: FieldKey, value: impl Into<FieldValue>) -> Self {
        Self::Edit {
            field,
            value: value.into(),
        }
    }

    fn name(&self) -> String {
        match self {
            Self::Edit { field, .. } => format!("edit({field})"),
            Self::Advance => "advance".to_string(),
            Self::Retreat => "retreat".to_string(),
            Self::JumpTo(step) => format!("jump_to({step})"),
            Self::Resolve(resolution) => format!("resolve({resolution:?})"),
            Self::DismissInterstitial => "dismiss_interstitial".to_string(),
            Self::DevSkip => "dev_skip".to_string(),
            Self::Abandon => "abandon".to_string(),
        }
    }
}

/// Work the caller must perform after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Effect {
    /// Run the flow's submission plan and report back via
    /// `FlowMachine::complete_submission`.
    Submit,
}

/// What the surrounding app should navigate to once the flow lets go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum NavigationIntent {
    /// The user backed out of the first step or abandoned the flow.
    Exit,
    Completed(SubmissionOutcome),
    Branch(FlowType),
}

/// The result of one accepted event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub from: FlowPhase,
    pub to: FlowPhase,
    pub effect: Option<Effect>,
    pub intent: Option<NavigationIntent>,
}

impl Transition {
    fn stay(phase: FlowPhase) -> Self {
        Self {
            from: phase.clone(),
            to: phase,
            effect: None,
            intent: None,
        }
    }

    /// Whether the event moved the session.
    pub fn moved(&self) -> bool {
        self.from != self.to
    }
}

/// One in-progress run of a flow.
#[derive(Debug, Clone, Serialize)]
pub struct FlowSession {
    id: Uuid,
    flow_type: FlowType,
    phase: FlowPhase,
    /// The step being edited, or the step that triggered the pending
    /// interstitial, or the terminal step while submitting.
    current_step: StepId,
    form: FormState,
    /// Root of the interstitial chain being shown.
    interstitial_root: Option<InterstitialId>,
    /// The overlay that was open when the user backed out of it; shown again
    /// instead of the root when the chain is re-entered.
    pending_interstitial: Option<InterstitialId>,
    completed_interstitials: Vec<InterstitialId>,
    submission: SubmissionStatus,
    field_errors: Vec<FieldError>,
    last_error: Option<ErrorInfo>,
    /// Responses of the submission calls that already succeeded.
    completed_requests: Vec<SubmissionOutcome>,
    started_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FlowSession {
    fn new(flow_type: FlowType, initial: StepId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            flow_type,
            phase: FlowPhase::Editing(initial),
            current_step: initial,
            form: FormState::new(),
            interstitial_root: None,
            pending_interstitial: None,
            completed_interstitials: Vec::new(),
            submission: SubmissionStatus::NotStarted,
            field_errors: Vec::new(),
            last_error: None,
            completed_requests: Vec::new(),
            started_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    pub fn phase(&self) -> &FlowPhase {
        &self.phase
    }

    pub fn current_step(&self) -> StepId {
        self.current_step
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn completed_interstitials(&self) -> &[InterstitialId] {
        &self.completed_interstitials
    }

    pub fn submission(&self) -> &SubmissionStatus {
        &self.submission
    }

    /// Inline errors from the last failed gate, minus fields edited since.
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// The submission failure to show on the terminal step.
    pub fn last_error(&self) -> Option<&ErrorInfo> {
        self.last_error.as_ref()
    }

    pub fn completed_requests(&self) -> &[SubmissionOutcome] {
        &self.completed_requests
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Drives one `FlowSession` through a `FlowDefinition`.
#[derive(Debug, Clone)]
pub struct FlowMachine {
    definition: Arc<FlowDefinition>,
    session: FlowSession,
    dev_skip_enabled: bool,
    pinned_today: Option<NaiveDate>,
}

impl FlowMachine {
    pub fn new(definition: Arc<FlowDefinition>, config: &FlowConfig) -> Self {
        let session = FlowSession::new(definition.flow_type(), definition.initial_step());
        info!(
            session_id = %session.id,
            flow = %session.flow_type,
            "Flow session started"
        );
        Self {
            definition,
            session,
            dev_skip_enabled: config.dev_skip_enabled,
            pinned_today: config.today,
        }
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    pub fn session(&self) -> &FlowSession {
        &self.session
    }

    pub fn phase(&self) -> &FlowPhase {
        &self.session.phase
    }

    /// Gate result for the step being edited, for enabling the "next"
    /// control. `None` outside `Editing`.
    pub fn gate(&self) -> Option<GateResult> {
        match self.session.phase {
            FlowPhase::Editing(step) => self
                .definition
                .validate(step, &self.session.form, self.today())
                .ok(),
            _ => None,
        }
    }

    fn today(&self) -> NaiveDate {
        self.pinned_today
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Apply one event.
    pub fn dispatch(&mut self, event: FlowEvent) -> Result<Transition, TransitionError> {
        let phase = self.session.phase.clone();
        let refused = || TransitionError::InvalidTransition {
            phase: phase.clone(),
            event: event.name(),
        };

        let transition = match (&phase, &event) {
            (FlowPhase::Editing(step), FlowEvent::Edit { field, value }) => {
                self.edit(*step, field, value.clone())?
            }
            (FlowPhase::Editing(step), FlowEvent::Advance) => self.advance(*step)?,
            (FlowPhase::Editing(step), FlowEvent::Retreat) => self.retreat(*step),
            (FlowPhase::Editing(step), FlowEvent::JumpTo(target)) => {
                self.jump_to(*step, *target).map_err(|e| e.unwrap_or_else(refused))?
            }
            (FlowPhase::Editing(step), FlowEvent::DevSkip) => self.dev_skip(*step)?,
            (FlowPhase::AwaitingInterstitial(id), FlowEvent::Resolve(resolution)) => {
                self.resolve(*id, *resolution)?
            }
            (FlowPhase::AwaitingInterstitial(_), FlowEvent::DismissInterstitial) => {
                // Nothing was chosen; the same overlay stays up.
                Transition::stay(phase.clone())
            }
            (FlowPhase::AwaitingInterstitial(id), FlowEvent::Retreat) => {
                self.session.pending_interstitial = Some(*id);
                let step = self.session.current_step;
                self.move_to(FlowPhase::Editing(step), None, None)
            }
            (FlowPhase::Editing(_) | FlowPhase::AwaitingInterstitial(_), FlowEvent::Abandon) => {
                self.session.interstitial_root = None;
                self.session.pending_interstitial = None;
                self.move_to(FlowPhase::Abandoned, None, Some(NavigationIntent::Exit))
            }
            (FlowPhase::Submitting, FlowEvent::Advance) => {
                debug!(session_id = %self.session.id, "Advance ignored while submitting");
                Transition::stay(phase.clone())
            }
            (
                FlowPhase::Submitting,
                FlowEvent::Edit { .. }
                | FlowEvent::Retreat
                | FlowEvent::JumpTo(_)
                | FlowEvent::DevSkip
                | FlowEvent::Abandon,
            ) => return Err(TransitionError::SubmissionInFlight),
            _ => return Err(refused()),
        };

        self.session.updated_at = Utc::now();
        Ok(transition)
    }

    /// Record the result of the submission started by `Effect::Submit`.
    pub fn complete_submission(
        &mut self,
        result: Result<SubmissionOutcome, ErrorInfo>,
    ) -> Result<Transition, TransitionError> {
        if self.session.phase != FlowPhase::Submitting {
            return Err(TransitionError::InvalidTransition {
                phase: self.session.phase.clone(),
                event: "complete_submission".to_string(),
            });
        }

        let transition = match result {
            Ok(outcome) => {
                self.set_submission(SubmissionStatus::Succeeded);
                self.session.last_error = None;
                self.move_to(
                    FlowPhase::Completed,
                    None,
                    Some(NavigationIntent::Completed(outcome)),
                )
            }
            Err(error) => {
                warn!(
                    session_id = %self.session.id,
                    flow = %self.session.flow_type,
                    error = %error.message,
                    "Submission failed"
                );
                self.set_submission(SubmissionStatus::Failed(error.clone()));
                self.session.last_error = Some(error);
                let step = self.session.current_step;
                self.move_to(FlowPhase::Editing(step), None, None)
            }
        };
        self.session.updated_at = Utc::now();
        Ok(transition)
    }

    /// Remember a submission call that succeeded so a retry can resume after it.
    pub(crate) fn record_request(&mut self, outcome: SubmissionOutcome) {
        self.session.completed_requests.push(outcome);
    }

    fn edit(
        &mut self,
        step: StepId,
        field: &FieldKey,
        value: FieldValue,
    ) -> Result<Transition, TransitionError> {
        let descriptor = self
            .definition
            .step(step)
            .ok_or(TransitionError::UnknownStep { step })?;
        if !descriptor.declares(field) {
            return Err(TransitionError::FieldNotOnStep {
                step,
                field: *field,
            });
        }
        self.apply_edit(*field, value);
        Ok(Transition::stay(self.session.phase.clone()))
    }

    fn apply_edit(&mut self, field: FieldKey, value: FieldValue) {
        let touched = self
            .definition
            .apply_edit(&mut self.session.form, field, value);
        self.session
            .field_errors
            .retain(|e| !touched.contains(&e.field));
        self.session.last_error = None;
    }

    fn advance(&mut self, step: StepId) -> Result<Transition, TransitionError> {
        let today = self.today();
        let gate = self.definition.validate(step, &self.session.form, today)?;
        if !gate.can_advance {
            debug!(
                session_id = %self.session.id,
                step = %step,
                errors = gate.errors.len(),
                "Validation gate blocked advance"
            );
            self.session.field_errors = gate.errors;
            return Ok(Transition::stay(self.session.phase.clone()));
        }
        self.session.field_errors.clear();

        if let Some(flow) = self
            .definition
            .step(step)
            .and_then(|s| s.branch_for(&self.session.form))
        {
            return Ok(self.move_to(
                FlowPhase::Branched(flow),
                None,
                Some(NavigationIntent::Branch(flow)),
            ));
        }

        if let Some(root) = self
            .definition
            .scheduler()
            .schedule_after(step, &self.session.completed_interstitials)
        {
            let show = match (self.session.interstitial_root, self.session.pending_interstitial) {
                (Some(open), Some(pending)) if open == root => pending,
                _ => root,
            };
            self.session.interstitial_root = Some(root);
            self.session.pending_interstitial = None;
            return Ok(self.move_to(FlowPhase::AwaitingInterstitial(show), None, None));
        }

        if let Some(next) = self
            .definition
            .next_reachable_step(step, &self.session.form)
        {
            self.session.current_step = next;
            return Ok(self.move_to(FlowPhase::Editing(next), None, None));
        }

        // An interstitial may have jumped over steps; every reachable step
        // must pass before anything is sent.
        if let Some((invalid, gate)) = self
            .definition
            .first_invalid_step(&self.session.form, today)
        {
            debug!(
                session_id = %self.session.id,
                step = %invalid,
                errors = gate.errors.len(),
                "Incomplete step found before submitting"
            );
            self.session.field_errors = gate.errors;
            self.session.current_step = invalid;
            return Ok(self.move_to(FlowPhase::Editing(invalid), None, None));
        }

        self.set_submission(SubmissionStatus::InFlight);
        self.session.last_error = None;
        Ok(self.move_to(FlowPhase::Submitting, Some(Effect::Submit), None))
    }

    fn retreat(&mut self, step: StepId) -> Transition {
        match self
            .definition
            .previous_reachable_step(step, &self.session.form)
        {
            Some(previous) => {
                self.session.current_step = previous;
                self.move_to(FlowPhase::Editing(previous), None, None)
            }
            None => self.move_to(FlowPhase::Abandoned, None, Some(NavigationIntent::Exit)),
        }
    }

    /// `Err(None)` means the jump is well-formed but not allowed from here.
    fn jump_to(
        &mut self,
        step: StepId,
        target: StepId,
    ) -> Result<Transition, Option<TransitionError>> {
        let descriptor = self
            .definition
            .step(target)
            .ok_or(Some(TransitionError::UnknownStep { step: target }))?;
        if target > step || !descriptor.is_reachable(&self.session.form) {
            return Err(None);
        }
        if target == step {
            return Ok(Transition::stay(self.session.phase.clone()));
        }
        self.session.current_step = target;
        Ok(self.move_to(FlowPhase::Editing(target), None, None))
    }

    fn resolve(
        &mut self,
        id: InterstitialId,
        resolution: Resolution,
    ) -> Result<Transition, TransitionError> {
        let target = self
            .definition
            .scheduler()
            .get(id)
            .and_then(|i| i.target(resolution))
            .ok_or(TransitionError::InvalidResolution {
                interstitial: id,
                resolution,
            })?;

        let transition = match target {
            ResolutionTarget::Represent => Transition::stay(self.session.phase.clone()),
            ResolutionTarget::Interstitial(next) => {
                self.move_to(FlowPhase::AwaitingInterstitial(next), None, None)
            }
            ResolutionTarget::Step(step) => {
                self.session.pending_interstitial = None;
                if let Some(root) = self.session.interstitial_root.take() {
                    self.session.completed_interstitials.push(root);
                }
                self.session.current_step = step;
                self.move_to(FlowPhase::Editing(step), None, None)
            }
        };
        Ok(transition)
    }

    fn dev_skip(&mut self, step: StepId) -> Result<Transition, TransitionError> {
        if !self.dev_skip_enabled {
            return Err(TransitionError::DevSkipDisabled);
        }
        let fixture = self
            .definition
            .step(step)
            .ok_or(TransitionError::UnknownStep { step })?
            .fixture
            .clone();
        debug!(session_id = %self.session.id, step = %step, "Developer skip");
        for (field, value) in fixture {
            self.apply_edit(field, value);
        }
        self.advance(step)
    }

    fn set_submission(&mut self, status: SubmissionStatus) {
        if !self.session.submission.can_transition_to(&status) {
            warn!(
                session_id = %self.session.id,
                from = ?self.session.submission,
                to = ?status,
                "Unexpected submission status change"
            );
        }
        self.session.submission = status;
    }

    fn move_to(
        &mut self,
        to: FlowPhase,
        effect: Option<Effect>,
        intent: Option<NavigationIntent>,
    ) -> Transition {
        let from = std::mem::replace(&mut self.session.phase, to.clone());
        info!(
            session_id = %self.session.id,
            flow = %self.session.flow_type,
            from = %from,
            to = %to,
            "Flow transition"
        );
        Transition {
            from,
            to,
            effect,
            intent,
        }
    }
}
