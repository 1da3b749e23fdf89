//! Validation gate — pure per-step checks run before every forward transition.
//!
//! The gate never caches: it is cheap enough to run on every keystroke, and the
//! machine re-runs it against the current form on each `Advance`. The date that
//! counts as "today" is passed in, so the gate never reads the clock.

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use serde::Serialize;

use crate::error::DefinitionError;

use super::form::{FieldKey, FormState};
use super::step::StepDescriptor;

/// Message used for required fields that are blank.
pub const REQUIRED_MESSAGE: &str = "This field is required.";

/// An inline, per-field validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: FieldKey,
    pub message: String,
}

impl FieldError {
    pub fn new(field: FieldKey, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Outcome of running the gate for one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateResult {
    pub can_advance: bool,
    pub errors: Vec<FieldError>,
}

impl GateResult {
    fn from_errors(errors: Vec<FieldError>) -> Self {
        Self {
            can_advance: errors.is_empty(),
            errors,
        }
    }

    pub fn error_for(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }
}

/// A declarative validation rule attached to a step.
///
/// Format rules (`Pattern`, `MinLength`, `PastDate`, `TimeRange`) only apply
/// once the field is filled; emptiness is the job of the step's required fields.
#[derive(Debug, Clone)]
pub enum Rule {
    Pattern {
        field: FieldKey,
        regex: Regex,
        message: &'static str,
    },
    MinLength {
        field: FieldKey,
        min: usize,
        message: &'static str,
    },
    MinItems {
        field: FieldKey,
        min: usize,
        message: &'static str,
    },
    /// Every field of `fields` whose key is listed in the `selector` list
    /// must be filled, e.g. the experience sections the user picked.
    SelectedFilled {
        selector: FieldKey,
        fields: Vec<FieldKey>,
        message: &'static str,
    },
    /// `field` must be filled unless the `waiver` flag is set.
    FilledUnlessWaived {
        field: FieldKey,
        waiver: FieldKey,
        message: &'static str,
    },
    /// Every flag in `fields` must be checked.
    AllTrue {
        fields: Vec<FieldKey>,
        message: &'static str,
    },
    /// The `all` toggle must equal the conjunction of its members.
    GroupConsistent {
        all: FieldKey,
        members: Vec<FieldKey>,
        message: &'static str,
    },
    /// `YYYY-MM-DD`, not in the future.
    PastDate {
        field: FieldKey,
        message: &'static str,
    },
    /// Two `HH:MM` fields with `start` strictly before `end`. Skipped while
    /// the `unless` flag is checked.
    TimeRange {
        start: FieldKey,
        end: FieldKey,
        unless: Option<FieldKey>,
        message: &'static str,
    },
}

impl Rule {
    /// Compile a regex rule. An invalid pattern is an authoring defect.
    pub fn pattern(
        field: FieldKey,
        pattern: &str,
        message: &'static str,
    ) -> Result<Self, DefinitionError> {
        let regex = Regex::new(pattern).map_err(|e| DefinitionError::InvalidPattern {
            field,
            reason: e.to_string(),
        })?;
        Ok(Self::Pattern {
            field,
            regex,
            message,
        })
    }

    /// Every field this rule reads.
    pub fn fields(&self) -> Vec<FieldKey> {
        match self {
            Self::Pattern { field, .. }
            | Self::MinLength { field, .. }
            | Self::MinItems { field, .. }
            | Self::PastDate { field, .. } => vec![*field],
            Self::AllTrue { fields, .. } => fields.clone(),
            Self::SelectedFilled {
                selector, fields, ..
            } => {
                let mut all = vec![*selector];
                all.extend(fields.iter().copied());
                all
            }
            Self::FilledUnlessWaived { field, waiver, .. } => vec![*field, *waiver],
            Self::GroupConsistent { all, members, .. } => {
                let mut fields = vec![*all];
                fields.extend(members.iter().copied());
                fields
            }
            Self::TimeRange {
                start, end, unless, ..
            } => {
                let mut fields = vec![*start, *end];
                fields.extend(*unless);
                fields
            }
        }
    }

    fn check(&self, form: &FormState, today: NaiveDate, errors: &mut Vec<FieldError>) {
        let mut report = |field: &FieldKey, message: &str| {
            let field = *field;
            // First error per field wins.
            if !errors.iter().any(|e| e.field == field) {
                errors.push(FieldError::new(field, message));
            }
        };

        match self {
            Self::Pattern {
                field,
                regex,
                message,
            } => {
                if form.is_filled(field) && !regex.is_match(form.text(field)) {
                    report(field, message);
                }
            }
            Self::MinLength {
                field,
                min,
                message,
            } => {
                if form.is_filled(field) && form.text(field).trim().chars().count() < *min {
                    report(field, message);
                }
            }
            Self::MinItems {
                field,
                min,
                message,
            } => {
                if form.list(field).len() < *min {
                    report(field, message);
                }
            }
            Self::SelectedFilled {
                selector,
                fields,
                message,
            } => {
                let selected = form.list(selector);
                for field in fields
                    .iter()
                    .filter(|f| selected.iter().any(|s| s.as_str() == **f) && !form.is_filled(f))
                {
                    report(field, message);
                }
            }
            Self::FilledUnlessWaived {
                field,
                waiver,
                message,
            } => {
                if !form.flag(waiver) && !form.is_filled(field) {
                    report(field, message);
                }
            }
            Self::AllTrue { fields, message } => {
                for field in fields.iter().filter(|f| !form.flag(f)) {
                    report(field, message);
                }
            }
            Self::GroupConsistent {
                all,
                members,
                message,
            } => {
                let every = members.iter().all(|m| form.flag(m));
                if form.flag(all) != every {
                    report(all, message);
                }
            }
            Self::PastDate { field, message } => {
                if form.is_filled(field) {
                    let valid = NaiveDate::parse_from_str(form.text(field).trim(), "%Y-%m-%d")
                        .is_ok_and(|date| date <= today);
                    if !valid {
                        report(field, message);
                    }
                }
            }
            Self::TimeRange {
                start,
                end,
                unless,
                message,
            } => {
                let waived = unless.is_some_and(|flag| form.flag(flag));
                if !waived && form.is_filled(start) && form.is_filled(end) {
                    let parse = |f: &str| NaiveTime::parse_from_str(form.text(f).trim(), "%H:%M");
                    match (parse(*start), parse(*end)) {
                        (Ok(s), Ok(e)) if s < e => {}
                        _ => report(end, message),
                    }
                }
            }
        }
    }
}

/// Run the gate for `step` against the current form, with `today` as the
/// latest acceptable past date.
pub fn validate(step: &StepDescriptor, form: &FormState, today: NaiveDate) -> GateResult {
    let mut errors = Vec::new();
    for &field in &step.required_fields {
        if !form.is_filled(field) {
            errors.push(FieldError::new(field, REQUIRED_MESSAGE));
        }
    }
    for rule in &step.rules {
        rule.check(form, today, &mut errors);
    }
    GateResult::from_errors(errors)
}
