//! Job-seeker signup: role, personal details, terms.
//!
//! Choosing the employer role on the first step forks into employer signup.

use serde_json::json;

use crate::error::{DefinitionError, SubmissionError};
use crate::flow::{FlowDefinition, FlowType, FormState, Normalize, Rule, StepDescriptor};
use crate::handoff::keys;
use crate::submission::{SubmissionContext, SubmissionRequest};

pub mod steps {
    pub const ROLE: u16 = 1;
    pub const USER_INFO: u16 = 2;
    pub const TERMS: u16 = 4;
}

pub mod fields {
    pub const ROLE: &str = "role";
    pub const NAME: &str = "name";
    pub const PHONE: &str = "phone";
    pub const BIRTHDATE: &str = "birthdate";
    pub const GENDER: &str = "gender";
    pub const NATIONALITY: &str = "nationality_code";
    pub const TERMS_ALL: &str = "terms_all";
    pub const TOS: &str = "tos_required";
    pub const PRIVACY: &str = "privacy_required";
    pub const SMS: &str = "sms_optional";
    pub const MARKETING: &str = "marketing_optional";
}

const TERM_MEMBERS: [&str; 4] = [fields::TOS, fields::PRIVACY, fields::SMS, fields::MARKETING];

pub fn definition() -> Result<FlowDefinition, DefinitionError> {
    use fields::*;

    FlowDefinition::builder(FlowType::JobSeekerSignup)
        .step(
            StepDescriptor::new(steps::ROLE, "role")
                .required(&[ROLE])
                .rule(Rule::pattern(
                    ROLE,
                    "^(job_seeker|employer)$",
                    "Choose whether you are looking for work or hiring.",
                )?)
                .branch(ROLE, "employer", FlowType::EmployerSignup)
                .fixture(ROLE, "job_seeker"),
        )
        .step(
            StepDescriptor::new(steps::USER_INFO, "user_info")
                .required(&[NAME, PHONE, BIRTHDATE, GENDER, NATIONALITY])
                .rule(Rule::pattern(PHONE, r"^\d{8,}$", "Enter a valid phone number.")?)
                .rule(Rule::PastDate {
                    field: BIRTHDATE,
                    message: "Enter a valid birthdate.",
                })
                .rule(Rule::pattern(GENDER, "^(male|female)$", "Choose a gender.")?)
                .fixture(NAME, "Test User")
                .fixture(PHONE, "01012345678")
                .fixture(BIRTHDATE, "1995-01-01")
                .fixture(GENDER, "male")
                .fixture(NATIONALITY, "KR"),
        )
        .step(
            StepDescriptor::new(steps::TERMS, "terms")
                .fields(&[TERMS_ALL])
                .fields(&TERM_MEMBERS)
                .rule(Rule::AllTrue {
                    fields: vec![TOS, PRIVACY],
                    message: "You must accept the required terms.",
                })
                .rule(Rule::GroupConsistent {
                    all: TERMS_ALL,
                    members: TERM_MEMBERS.to_vec(),
                    message: "Agree-to-all does not match the individual terms.",
                })
                .fixture(TERMS_ALL, true),
        )
        .checkbox_group(TERMS_ALL, &TERM_MEMBERS)
        .normalize(PHONE, Normalize::DigitsOnly)
        .submit_with(signup_request)
        .writes_handoff(keys::SIGNUP_USER_ID)
        .build()
}

fn signup_request(
    form: &FormState,
    ctx: &SubmissionContext<'_>,
) -> Result<Option<SubmissionRequest>, SubmissionError> {
    use fields::*;

    if !ctx.completed.is_empty() {
        return Ok(None);
    }
    let body = json!({
        "role": form.text(ROLE),
        "name": form.text(NAME).trim(),
        "phone": form.text(PHONE),
        "birthdate": form.text(BIRTHDATE),
        "gender": form.text(GENDER),
        "nationality_code": form.text(NATIONALITY),
        "terms": {
            "tos_required": form.flag(TOS),
            "privacy_required": form.flag(PRIVACY),
            "sms_optional": form.flag(SMS),
            "marketing_optional": form.flag(MARKETING),
        },
    });
    Ok(Some(SubmissionRequest::post(FlowType::JobSeekerSignup.endpoint(), body)))
}
