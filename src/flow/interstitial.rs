//! Interstitial scheduler — modals and bottom sheets shown between steps.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::step::StepId;

/// Identifier of one interstitial overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct InterstitialId(pub &'static str);

impl fmt::Display for InterstitialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// How an interstitial's resolutions behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterstitialKind {
    /// Every resolution leads to the same place.
    Confirmation,
    /// Only agreeing moves on; every other resolution re-presents it.
    RequiredAgreement,
}

/// A user action that closes an interstitial through one of its buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Confirm,
    Skip,
    GoToSettings,
    Agree,
    Decline,
    Close,
}

/// Where a resolution leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionTarget {
    Step(StepId),
    Interstitial(InterstitialId),
    Represent,
}

/// One overlay and its resolution table.
#[derive(Debug, Clone)]
pub struct InterstitialDescriptor {
    pub id: InterstitialId,
    pub kind: InterstitialKind,
    /// The step whose successful advance shows this overlay. `None` for
    /// overlays only reached by chaining from another interstitial.
    pub trigger_after: Option<StepId>,
    resolutions: Vec<(Resolution, ResolutionTarget)>,
}

impl InterstitialDescriptor {
    pub fn confirmation(id: &'static str) -> Self {
        Self::new(id, InterstitialKind::Confirmation)
    }

    pub fn required_agreement(id: &'static str) -> Self {
        Self::new(id, InterstitialKind::RequiredAgreement)
    }

    fn new(id: &'static str, kind: InterstitialKind) -> Self {
        Self {
            id: InterstitialId(id),
            kind,
            trigger_after: None,
            resolutions: Vec::new(),
        }
    }

    pub fn after(mut self, step: u16) -> Self {
        self.trigger_after = Some(StepId(step));
        self
    }

    pub fn on(mut self, resolution: Resolution, target: ResolutionTarget) -> Self {
        self.resolutions.retain(|(r, _)| *r != resolution);
        self.resolutions.push((resolution, target));
        self
    }

    pub fn on_step(self, resolution: Resolution, step: u16) -> Self {
        self.on(resolution, ResolutionTarget::Step(StepId(step)))
    }

    pub fn on_interstitial(self, resolution: Resolution, next: &'static str) -> Self {
        self.on(resolution, ResolutionTarget::Interstitial(InterstitialId(next)))
    }

    pub fn represent_on(self, resolution: Resolution) -> Self {
        self.on(resolution, ResolutionTarget::Represent)
    }

    pub fn target(&self, resolution: Resolution) -> Option<ResolutionTarget> {
        self.resolutions
            .iter()
            .find(|(r, _)| *r == resolution)
            .map(|(_, t)| *t)
    }

    pub fn resolutions(&self) -> impl Iterator<Item = (Resolution, ResolutionTarget)> + '_ {
        self.resolutions.iter().copied()
    }
}

/// Lookup table consulted by the machine on every forward transition.
#[derive(Debug, Clone, Default)]
pub struct InterstitialScheduler {
    table: Vec<InterstitialDescriptor>,
}

impl InterstitialScheduler {
    pub(crate) fn new(table: Vec<InterstitialDescriptor>) -> Self {
        Self { table }
    }

    /// The overlay to show after advancing from `step`, skipping overlays
    /// whose chain the user already completed in this session.
    pub fn schedule_after(
        &self,
        step: StepId,
        completed: &[InterstitialId],
    ) -> Option<InterstitialId> {
        self.table
            .iter()
            .find(|i| i.trigger_after == Some(step) && !completed.contains(&i.id))
            .map(|i| i.id)
    }

    pub fn get(&self, id: InterstitialId) -> Option<&InterstitialDescriptor> {
        self.table.iter().find(|i| i.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterstitialDescriptor> {
        self.table.iter()
    }
}
