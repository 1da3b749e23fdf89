//! Step descriptors and reachability conditions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::definition::FlowType;
use super::form::{FieldKey, FieldValue, FormState};
use super::validation::Rule;

/// Identifier of one screen in a flow. Ordering follows the step table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(pub u16);

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// When a step is reachable, evaluated against the current form.
///
/// Conditions are plain data so the definition builder can check that every
/// step is reachable at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Always,
    IsTrue(FieldKey),
    IsFalse(FieldKey),
    Equals(FieldKey, &'static str),
    Filled(FieldKey),
}

impl Condition {
    pub fn holds(&self, form: &FormState) -> bool {
        match self {
            Self::Always => true,
            Self::IsTrue(field) => form.flag(field),
            Self::IsFalse(field) => !form.flag(field),
            Self::Equals(field, expected) => form.text(field) == *expected,
            Self::Filled(field) => form.is_filled(field),
        }
    }

    /// The field this condition reads, if any.
    pub fn field(&self) -> Option<FieldKey> {
        match self {
            Self::Always => None,
            Self::IsTrue(f) | Self::IsFalse(f) | Self::Equals(f, _) | Self::Filled(f) => Some(*f),
        }
    }

    /// Whether the condition holds before anything has been entered.
    pub fn holds_initially(&self) -> bool {
        self.holds(&FormState::default())
    }
}

/// A step-level fork into a different flow type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Branch {
    pub field: FieldKey,
    pub value: &'static str,
    pub to: FlowType,
}

/// One entry in a flow's step table.
#[derive(Debug, Clone)]
pub struct StepDescriptor {
    pub id: StepId,
    pub name: &'static str,
    /// Every field the step's screen may edit.
    pub fields: Vec<FieldKey>,
    /// Fields that must be non-blank before advancing.
    pub required_fields: Vec<FieldKey>,
    pub reachable: Condition,
    pub rules: Vec<Rule>,
    /// Placeholder values used by the developer skip.
    pub fixture: Vec<(FieldKey, FieldValue)>,
    pub branches: Vec<Branch>,
}

impl StepDescriptor {
    pub fn new(id: u16, name: &'static str) -> Self {
        Self {
            id: StepId(id),
            name,
            fields: Vec::new(),
            required_fields: Vec::new(),
            reachable: Condition::Always,
            rules: Vec::new(),
            fixture: Vec::new(),
            branches: Vec::new(),
        }
    }

    /// Declare optional fields edited on this step.
    pub fn fields(mut self, fields: &[FieldKey]) -> Self {
        for &field in fields {
            if !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
        self
    }

    /// Declare required fields; they are also editable on this step.
    pub fn required(mut self, fields: &[FieldKey]) -> Self {
        self = self.fields(fields);
        for &field in fields {
            if !self.required_fields.contains(&field) {
                self.required_fields.push(field);
            }
        }
        self
    }

    pub fn reachable_when(mut self, condition: Condition) -> Self {
        self.reachable = condition;
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn fixture(mut self, field: FieldKey, value: impl Into<FieldValue>) -> Self {
        self.fixture.push((field, value.into()));
        self
    }

    pub fn branch(mut self, field: FieldKey, value: &'static str, to: FlowType) -> Self {
        self.branches.push(Branch { field, value, to });
        self
    }

    pub fn declares(&self, field: &str) -> bool {
        self.fields.iter().any(|f| *f == field)
    }

    pub fn is_reachable(&self, form: &FormState) -> bool {
        self.reachable.holds(form)
    }

    /// The flow this step forks into for the current form, if any.
    pub fn branch_for(&self, form: &FormState) -> Option<FlowType> {
        self.branches
            .iter()
            .find(|b| form.text(b.field) == b.value)
            .map(|b| b.to)
    }
}
