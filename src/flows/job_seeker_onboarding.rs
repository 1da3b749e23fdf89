//! Job-seeker onboarding, run right after signup.
//!
//! Step numbering continues from signup, so the first step is 2. The profile
//! is saved against the user id signup left in the handoff store.

use serde_json::json;

use crate::error::{DefinitionError, SubmissionError};
use crate::flow::{FieldValue, FlowDefinition, FlowType, FormState, Rule, StepDescriptor};
use crate::handoff::keys;
use crate::submission::{SubmissionContext, SubmissionRequest};

pub mod steps {
    pub const BASIC_INFO: u16 = 2;
    pub const PREFERRED_REGION: u16 = 3;
    pub const PREFERRED_JOB: u16 = 4;
    pub const WORK_CALENDAR: u16 = 5;
    pub const WORK_SCHEDULE: u16 = 6;
    pub const EXPERIENCE: u16 = 7;
    pub const EXPERIENCE_DETAIL: u16 = 8;
}

pub mod fields {
    pub const BASIC_INFO_FILE: &str = "basic_info_file_name";
    pub const PREFERRED_REGIONS: &str = "preferred_regions";
    pub const PREFERRED_JOBS: &str = "preferred_jobs";
    pub const AVAILABLE_DATES: &str = "available_dates";
    pub const START_TIME: &str = "start_time";
    pub const END_TIME: &str = "end_time";
    /// "Any time": both times are sent as `00:00`.
    pub const ANY_TIME: &str = "any_time";
    pub const DAYS_OF_WEEK: &str = "days_of_week";
    pub const ALL_DAYS: &str = "all_days";
    pub const EXPERIENCE_SECTIONS: &str = "experience_sections";
    pub const CAREER: &str = "career";
    pub const LICENSE: &str = "license";
    pub const SKILLS: &str = "skills";
    pub const INTRODUCTION: &str = "introduction";
}

pub const WEEK_DAYS: [&str; 7] = ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// Time sent for both ends of the range when any time works.
pub const ANY_TIME_VALUE: &str = "00:00";

pub fn definition() -> Result<FlowDefinition, DefinitionError> {
    use fields::*;

    FlowDefinition::builder(FlowType::JobSeekerOnboarding)
        .step(StepDescriptor::new(steps::BASIC_INFO, "basic_info").fields(&[BASIC_INFO_FILE]))
        .step(
            StepDescriptor::new(steps::PREFERRED_REGION, "preferred_region")
                .fields(&[PREFERRED_REGIONS])
                .rule(Rule::MinItems {
                    field: PREFERRED_REGIONS,
                    min: 1,
                    message: "Choose at least one region.",
                })
                .fixture(PREFERRED_REGIONS, FieldValue::list(["Seoul"])),
        )
        .step(
            StepDescriptor::new(steps::PREFERRED_JOB, "preferred_job")
                .fields(&[PREFERRED_JOBS])
                .rule(Rule::MinItems {
                    field: PREFERRED_JOBS,
                    min: 1,
                    message: "Choose at least one job.",
                })
                .fixture(PREFERRED_JOBS, FieldValue::list(["restaurant"])),
        )
        .step(
            StepDescriptor::new(steps::WORK_CALENDAR, "work_calendar").fields(&[AVAILABLE_DATES]),
        )
        .step(
            StepDescriptor::new(steps::WORK_SCHEDULE, "work_schedule")
                .required(&[START_TIME, END_TIME])
                .fields(&[ANY_TIME, DAYS_OF_WEEK, ALL_DAYS])
                .rule(Rule::TimeRange {
                    start: START_TIME,
                    end: END_TIME,
                    unless: Some(ANY_TIME),
                    message: "End time must be after start time.",
                })
                .rule(Rule::MinItems {
                    field: DAYS_OF_WEEK,
                    min: 1,
                    message: "Choose at least one day.",
                })
                .fixture(START_TIME, "09:00")
                .fixture(END_TIME, "18:00")
                .fixture(DAYS_OF_WEEK, FieldValue::list(["MON", "TUE", "WED"])),
        )
        .step(
            StepDescriptor::new(steps::EXPERIENCE, "experience")
                .fields(&[EXPERIENCE_SECTIONS])
                .rule(Rule::MinItems {
                    field: EXPERIENCE_SECTIONS,
                    min: 1,
                    message: "Choose at least one section.",
                })
                .fixture(EXPERIENCE_SECTIONS, FieldValue::list([CAREER])),
        )
        .step(
            StepDescriptor::new(steps::EXPERIENCE_DETAIL, "experience_detail")
                .fields(&[EXPERIENCE_SECTIONS, CAREER, LICENSE, SKILLS, INTRODUCTION])
                .rule(Rule::SelectedFilled {
                    selector: EXPERIENCE_SECTIONS,
                    fields: vec![CAREER, LICENSE, SKILLS, INTRODUCTION],
                    message: "Fill in this section.",
                })
                .fixture(CAREER, "Two years of restaurant work"),
        )
        .preset(ANY_TIME, &[(START_TIME, ANY_TIME_VALUE), (END_TIME, ANY_TIME_VALUE)])
        .list_toggle(ALL_DAYS, DAYS_OF_WEEK, &WEEK_DAYS)
        .submit_with(profile_request)
        .reads_handoff(keys::SIGNUP_USER_ID)
        .build()
}

fn profile_request(
    form: &FormState,
    ctx: &SubmissionContext<'_>,
) -> Result<Option<SubmissionRequest>, SubmissionError> {
    use fields::*;

    if !ctx.completed.is_empty() {
        return Ok(None);
    }
    let user_id = ctx.handoff.ok_or_else(|| SubmissionError::MissingHandoff {
        key: keys::SIGNUP_USER_ID.to_string(),
    })?;
    let file_name = match form.text(BASIC_INFO_FILE).trim() {
        "" => serde_json::Value::Null,
        name => json!(name),
    };
    let body = json!({
        "user_id": user_id,
        "basic_info_file_name": file_name,
        "preferred_regions": form.list(PREFERRED_REGIONS),
        "preferred_jobs": form.list(PREFERRED_JOBS),
        "work_schedule": {
            "available_dates": form.list(AVAILABLE_DATES),
            "start_time": form.text(START_TIME),
            "end_time": form.text(END_TIME),
            "days_of_week": form.list(DAYS_OF_WEEK),
        },
        "experience": {
            "sections": form.list(EXPERIENCE_SECTIONS),
            "data": {
                "career": form.text(CAREER),
                "license": form.text(LICENSE),
                "skills": form.text(SKILLS),
                "introduction": form.text(INTRODUCTION),
            },
        },
    });
    Ok(Some(SubmissionRequest::post(FlowType::JobSeekerOnboarding.endpoint(), body)))
}
