//! Flow definitions — the step table, interstitials, and edit semantics for one
//! flow type, checked once at construction.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DefinitionError, SubmissionError, TransitionError};
use crate::submission::{SubmissionContext, SubmissionPlan, SubmissionRequest};

use super::form::{FieldKey, FieldValue, FormState};
use super::interstitial::{
    InterstitialDescriptor, InterstitialId, InterstitialKind, InterstitialScheduler, Resolution,
    ResolutionTarget,
};
use super::step::{Condition, StepDescriptor, StepId};
use super::validation::{GateResult, validate};

/// The wizards this controller drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    JobSeekerSignup,
    EmployerSignup,
    JobSeekerOnboarding,
}

impl FlowType {
    /// Backend path the flow submits to when it has no custom plan.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::JobSeekerSignup => "/auth/signup",
            Self::EmployerSignup => "/auth/signup/employer",
            Self::JobSeekerOnboarding => "/job-seeker/profile",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::JobSeekerSignup => "job_seeker_signup",
            Self::EmployerSignup => "employer_signup",
            Self::JobSeekerOnboarding => "job_seeker_onboarding",
        };
        write!(f, "{s}")
    }
}

/// A "does not apply" flag that clears the field it waives when checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Waiver {
    pub flag: FieldKey,
    pub waives: FieldKey,
}

/// A checkbox group with an "all" toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckboxGroup {
    pub all: FieldKey,
    pub members: Vec<FieldKey>,
}

/// A flag that fills fields with fixed values while checked and clears them
/// when unchecked, e.g. "any time" setting both times to `00:00`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preset {
    pub flag: FieldKey,
    pub values: Vec<(FieldKey, &'static str)>,
}

/// An "all" toggle over a multi-select list, e.g. every day of the week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListToggle {
    pub all: FieldKey,
    pub list: FieldKey,
    pub options: Vec<&'static str>,
}

/// Input normalization applied to text edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalize {
    Trim,
    DigitsOnly,
}

impl Normalize {
    pub fn apply(&self, input: &str) -> String {
        match self {
            Self::Trim => input.trim().to_string(),
            Self::DigitsOnly => input.chars().filter(char::is_ascii_digit).collect(),
        }
    }
}

/// Posts the whole form to the flow's default endpoint, once.
fn post_whole_form(
    form: &FormState,
    ctx: &SubmissionContext<'_>,
) -> Result<Option<SubmissionRequest>, SubmissionError> {
    if !ctx.completed.is_empty() {
        return Ok(None);
    }
    let body =
        serde_json::to_value(form).map_err(|e| SubmissionError::Payload(e.to_string()))?;
    Ok(Some(SubmissionRequest::post(ctx.flow_type.endpoint(), body)))
}

/// A validated, immutable flow definition.
#[derive(Debug, Clone)]
pub struct FlowDefinition {
    flow_type: FlowType,
    steps: Vec<StepDescriptor>,
    scheduler: InterstitialScheduler,
    waivers: Vec<Waiver>,
    groups: Vec<CheckboxGroup>,
    presets: Vec<Preset>,
    list_toggles: Vec<ListToggle>,
    normalizers: Vec<(FieldKey, Normalize)>,
    plan: SubmissionPlan,
    reads_handoff: Option<&'static str>,
    writes_handoff: Option<&'static str>,
}

impl FlowDefinition {
    pub fn builder(flow_type: FlowType) -> FlowDefinitionBuilder {
        FlowDefinitionBuilder::new(flow_type)
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow_type
    }

    pub fn steps(&self) -> &[StepDescriptor] {
        &self.steps
    }

    pub fn step(&self, id: StepId) -> Option<&StepDescriptor> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.step(id).is_some()
    }

    pub fn initial_step(&self) -> StepId {
        // The builder rejects empty tables.
        self.steps[0].id
    }

    pub fn scheduler(&self) -> &InterstitialScheduler {
        &self.scheduler
    }

    pub fn plan(&self) -> SubmissionPlan {
        self.plan
    }

    /// Handoff key read before submitting, e.g. the signup user id.
    pub fn reads_handoff(&self) -> Option<&'static str> {
        self.reads_handoff
    }

    /// Handoff key written once the flow completes.
    pub fn writes_handoff(&self) -> Option<&'static str> {
        self.writes_handoff
    }

    fn index_of(&self, id: StepId) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    /// First step after `current` whose reachability condition holds.
    /// `None` means `current` is the terminal step.
    pub fn next_reachable_step(&self, current: StepId, form: &FormState) -> Option<StepId> {
        let index = self.index_of(current)?;
        self.steps[index + 1..]
            .iter()
            .find(|s| s.is_reachable(form))
            .map(|s| s.id)
    }

    /// Last step before `current` whose reachability condition holds.
    pub fn previous_reachable_step(&self, current: StepId, form: &FormState) -> Option<StepId> {
        let index = self.index_of(current)?;
        self.steps[..index]
            .iter()
            .rev()
            .find(|s| s.is_reachable(form))
            .map(|s| s.id)
    }

    pub fn is_terminal(&self, current: StepId, form: &FormState) -> bool {
        self.next_reachable_step(current, form).is_none()
    }

    /// Run the validation gate for `step`.
    pub fn validate(
        &self,
        step: StepId,
        form: &FormState,
        today: NaiveDate,
    ) -> Result<GateResult, TransitionError> {
        let descriptor = self
            .step(step)
            .ok_or(TransitionError::UnknownStep { step })?;
        Ok(validate(descriptor, form, today))
    }

    /// The earliest reachable step whose gate fails, with its errors.
    /// `None` means the whole form is ready to submit.
    pub fn first_invalid_step(
        &self,
        form: &FormState,
        today: NaiveDate,
    ) -> Option<(StepId, GateResult)> {
        self.steps
            .iter()
            .filter(|s| s.is_reachable(form))
            .map(|s| (s.id, validate(s, form, today)))
            .find(|(_, gate)| !gate.can_advance)
    }

    /// Apply one field edit, including normalization, checkbox-group
    /// propagation and waivers. Returns every field whose value changed or was
    /// cleared so the caller can drop their stale errors.
    pub(crate) fn apply_edit(
        &self,
        form: &mut FormState,
        field: FieldKey,
        value: FieldValue,
    ) -> Vec<FieldKey> {
        let value = match (self.normalizer(field), value) {
            (Some(normalize), FieldValue::Text(text)) => FieldValue::Text(normalize.apply(&text)),
            (_, value) => value,
        };
        let mut touched = vec![field];

        if let Some(group) = self.groups.iter().find(|g| g.all == field)
            && let Some(on) = value.as_flag()
        {
            for &member in &group.members {
                form.set(member, on.into());
                touched.push(member);
            }
        }

        let checked = value.as_flag() == Some(true);
        form.set(field, value);

        if let Some(group) = self.groups.iter().find(|g| g.members.contains(&field)) {
            let every = group.members.iter().all(|m| form.flag(m));
            form.set(group.all, every.into());
            touched.push(group.all);
        }

        if checked {
            for waiver in self.waivers.iter().filter(|w| w.flag == field) {
                form.remove(waiver.waives);
                touched.push(waiver.waives);
            }
        }

        for preset in &self.presets {
            if preset.flag == field {
                for &(key, value) in &preset.values {
                    if checked {
                        form.set(key, value.into());
                    } else {
                        form.remove(key);
                    }
                    touched.push(key);
                }
            } else if form.flag(preset.flag) && preset.values.iter().any(|(k, _)| *k == field) {
                // Editing a preset value by hand turns the preset off.
                form.set(preset.flag, false.into());
                touched.push(preset.flag);
            }
        }

        for toggle in &self.list_toggles {
            if toggle.all == field
                && let Some(on) = form.get(field).and_then(FieldValue::as_flag)
            {
                let items = if on { toggle.options.clone() } else { Vec::new() };
                form.set(toggle.list, FieldValue::list(items));
                touched.push(toggle.list);
            } else if toggle.list == field {
                let selected = form.list(field);
                let every = toggle
                    .options
                    .iter()
                    .all(|o| selected.iter().any(|s| s.as_str() == *o));
                form.set(toggle.all, every.into());
                touched.push(toggle.all);
            }
        }

        touched
    }

    fn normalizer(&self, field: FieldKey) -> Option<Normalize> {
        self.normalizers
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, n)| *n)
    }
}

/// Builder for `FlowDefinition`. `build` fails fast on authoring defects.
pub struct FlowDefinitionBuilder {
    flow_type: FlowType,
    steps: Vec<StepDescriptor>,
    interstitials: Vec<InterstitialDescriptor>,
    waivers: Vec<Waiver>,
    groups: Vec<CheckboxGroup>,
    presets: Vec<Preset>,
    list_toggles: Vec<ListToggle>,
    normalizers: Vec<(FieldKey, Normalize)>,
    plan: SubmissionPlan,
    reads_handoff: Option<&'static str>,
    writes_handoff: Option<&'static str>,
}

impl FlowDefinitionBuilder {
    fn new(flow_type: FlowType) -> Self {
        Self {
            flow_type,
            steps: Vec::new(),
            interstitials: Vec::new(),
            waivers: Vec::new(),
            groups: Vec::new(),
            presets: Vec::new(),
            list_toggles: Vec::new(),
            normalizers: Vec::new(),
            plan: post_whole_form,
            reads_handoff: None,
            writes_handoff: None,
        }
    }

    pub fn step(mut self, step: StepDescriptor) -> Self {
        self.steps.push(step);
        self
    }

    pub fn interstitial(mut self, interstitial: InterstitialDescriptor) -> Self {
        self.interstitials.push(interstitial);
        self
    }

    pub fn waiver(mut self, flag: FieldKey, waives: FieldKey) -> Self {
        self.waivers.push(Waiver { flag, waives });
        self
    }

    pub fn checkbox_group(mut self, all: FieldKey, members: &[FieldKey]) -> Self {
        self.groups.push(CheckboxGroup {
            all,
            members: members.to_vec(),
        });
        self
    }

    pub fn preset(mut self, flag: FieldKey, values: &[(FieldKey, &'static str)]) -> Self {
        self.presets.push(Preset {
            flag,
            values: values.to_vec(),
        });
        self
    }

    pub fn list_toggle(mut self, all: FieldKey, list: FieldKey, options: &[&'static str]) -> Self {
        self.list_toggles.push(ListToggle {
            all,
            list,
            options: options.to_vec(),
        });
        self
    }

    pub fn normalize(mut self, field: FieldKey, normalize: Normalize) -> Self {
        self.normalizers.push((field, normalize));
        self
    }

    pub fn submit_with(mut self, plan: SubmissionPlan) -> Self {
        self.plan = plan;
        self
    }

    pub fn reads_handoff(mut self, key: &'static str) -> Self {
        self.reads_handoff = Some(key);
        self
    }

    pub fn writes_handoff(mut self, key: &'static str) -> Self {
        self.writes_handoff = Some(key);
        self
    }

    pub fn build(self) -> Result<FlowDefinition, DefinitionError> {
        self.check_steps()?;
        self.check_edit_semantics()?;
        self.check_interstitials()?;

        Ok(FlowDefinition {
            flow_type: self.flow_type,
            steps: self.steps,
            scheduler: InterstitialScheduler::new(self.interstitials),
            waivers: self.waivers,
            groups: self.groups,
            presets: self.presets,
            list_toggles: self.list_toggles,
            normalizers: self.normalizers,
            plan: self.plan,
            reads_handoff: self.reads_handoff,
            writes_handoff: self.writes_handoff,
        })
    }

    fn check_steps(&self) -> Result<(), DefinitionError> {
        let Some(first) = self.steps.first() else {
            return Err(DefinitionError::EmptyTable {
                flow: self.flow_type.to_string(),
            });
        };
        if !first.reachable.holds_initially() {
            return Err(DefinitionError::UnreachableStep {
                step: first.id,
                reason: "the initial step must be reachable from an empty form".to_string(),
            });
        }

        for (index, step) in self.steps.iter().enumerate() {
            if index > 0 && self.steps[index - 1].id >= step.id {
                return Err(DefinitionError::DuplicateStep { step: step.id });
            }

            let referenced = step
                .required_fields
                .iter()
                .copied()
                .chain(step.rules.iter().flat_map(|r| r.fields()))
                .chain(step.fixture.iter().map(|(f, _)| *f))
                .chain(step.branches.iter().map(|b| b.field));
            for field in referenced {
                if !step.declares(field) {
                    return Err(DefinitionError::UnknownField {
                        step: step.id,
                        field,
                    });
                }
            }

            // A condition that is false on an empty form needs a field some
            // earlier step can set, or the step is a dead end.
            if let Some(field) = step.reachable.field()
                && !step.reachable.holds_initially()
                && !self.steps[..index].iter().any(|s| s.declares(field))
            {
                return Err(DefinitionError::UnreachableStep {
                    step: step.id,
                    reason: format!("its condition reads {field}, which no earlier step collects"),
                });
            }
        }
        Ok(())
    }

    fn check_edit_semantics(&self) -> Result<(), DefinitionError> {
        let fields = self
            .waivers
            .iter()
            .flat_map(|w| [w.flag, w.waives])
            .chain(
                self.groups
                    .iter()
                    .flat_map(|g| std::iter::once(g.all).chain(g.members.iter().copied())),
            )
            .chain(
                self.presets
                    .iter()
                    .flat_map(|p| std::iter::once(p.flag).chain(p.values.iter().map(|(k, _)| *k))),
            )
            .chain(self.list_toggles.iter().flat_map(|t| [t.all, t.list]))
            .chain(self.normalizers.iter().map(|(f, _)| *f));
        for field in fields {
            if !self.steps.iter().any(|s| s.declares(field)) {
                return Err(DefinitionError::UndeclaredField { field });
            }
        }
        Ok(())
    }

    fn check_interstitials(&self) -> Result<(), DefinitionError> {
        let misconfigured = |id: InterstitialId, reason: String| {
            DefinitionError::InterstitialMisconfiguration {
                interstitial: id,
                reason,
            }
        };

        for (index, interstitial) in self.interstitials.iter().enumerate() {
            let id = interstitial.id;
            if self.interstitials[..index].iter().any(|i| i.id == id) {
                return Err(misconfigured(id, "declared more than once".to_string()));
            }
            check_resolution_shape(interstitial).map_err(|reason| misconfigured(id, reason))?;

            if let Some(trigger) = interstitial.trigger_after {
                if !self.steps.iter().any(|s| s.id == trigger) {
                    return Err(misconfigured(id, format!("trigger step {trigger} does not exist")));
                }
                if self.steps.last().is_some_and(|s| s.id == trigger) {
                    return Err(misconfigured(
                        id,
                        format!("trigger step {trigger} is the last step and submits instead"),
                    ));
                }
                if self.interstitials[..index]
                    .iter()
                    .any(|i| i.trigger_after == Some(trigger))
                {
                    return Err(misconfigured(
                        id,
                        format!("step {trigger} already schedules another interstitial"),
                    ));
                }
            }
        }

        let mut shown = Vec::new();
        for root in &self.interstitials {
            if let Some(trigger) = root.trigger_after {
                self.walk_chain(root.id, trigger, &mut Vec::new(), &mut shown)?;
            }
        }
        if let Some(orphan) = self.interstitials.iter().find(|i| !shown.contains(&i.id)) {
            return Err(misconfigured(
                orphan.id,
                "no step or interstitial ever leads to it".to_string(),
            ));
        }
        Ok(())
    }

    /// Follow every resolution from `id`, checking that each chain ends on an
    /// existing, unconditional step after `trigger`.
    fn walk_chain(
        &self,
        id: InterstitialId,
        trigger: StepId,
        path: &mut Vec<InterstitialId>,
        shown: &mut Vec<InterstitialId>,
    ) -> Result<(), DefinitionError> {
        let misconfigured = |reason: String| DefinitionError::InterstitialMisconfiguration {
            interstitial: id,
            reason,
        };
        if path.contains(&id) {
            return Err(misconfigured("interstitial chain loops back on itself".to_string()));
        }
        let Some(interstitial) = self.interstitials.iter().find(|i| i.id == id) else {
            return Err(misconfigured("referenced but not declared".to_string()));
        };
        path.push(id);
        if !shown.contains(&id) {
            shown.push(id);
        }

        for (resolution, target) in interstitial.resolutions() {
            match target {
                ResolutionTarget::Represent => {}
                ResolutionTarget::Step(step) => {
                    let Some(descriptor) = self.steps.iter().find(|s| s.id == step) else {
                        return Err(misconfigured(format!(
                            "{resolution:?} leads to unknown step {step}"
                        )));
                    };
                    if step <= trigger {
                        return Err(misconfigured(format!(
                            "{resolution:?} leads back to step {step}, not past trigger {trigger}"
                        )));
                    }
                    if descriptor.reachable != Condition::Always {
                        return Err(misconfigured(format!(
                            "{resolution:?} leads to conditional step {step}"
                        )));
                    }
                }
                ResolutionTarget::Interstitial(next) => {
                    let chained_only = self
                        .interstitials
                        .iter()
                        .find(|i| i.id == next)
                        .is_some_and(|i| i.trigger_after.is_none());
                    if !chained_only {
                        return Err(misconfigured(format!(
                            "{resolution:?} chains to {next}, which is missing or step-triggered"
                        )));
                    }
                    self.walk_chain(next, trigger, path, shown)?;
                }
            }
        }

        path.pop();
        Ok(())
    }
}

/// Kind-specific resolution rules.
fn check_resolution_shape(interstitial: &InterstitialDescriptor) -> Result<(), String> {
    let mut resolutions = interstitial.resolutions().peekable();
    if resolutions.peek().is_none() {
        return Err("has no resolutions".to_string());
    }

    match interstitial.kind {
        InterstitialKind::Confirmation => {
            let targets: Vec<ResolutionTarget> = resolutions.map(|(_, t)| t).collect();
            if targets.contains(&ResolutionTarget::Represent) {
                return Err("a confirmation cannot re-present itself".to_string());
            }
            if targets.windows(2).any(|pair| pair[0] != pair[1]) {
                return Err("confirmation resolutions must all converge".to_string());
            }
        }
        InterstitialKind::RequiredAgreement => {
            let mut agrees = false;
            for (resolution, target) in resolutions {
                match (resolution, target) {
                    (Resolution::Agree, ResolutionTarget::Represent) => {
                        return Err("agreeing must move forward".to_string());
                    }
                    (Resolution::Agree, _) => agrees = true,
                    (_, ResolutionTarget::Represent) => {}
                    (other, _) => {
                        return Err(format!("{other:?} must re-present until agreement"));
                    }
                }
            }
            if !agrees {
                return Err("has no Agree resolution".to_string());
            }
        }
    }
    Ok(())
}
