//! Employer signup.
//!
//! After the contact details, a notification-permission prompt chains into the
//! workplace-rules agreement, which must be accepted before the business
//! details. The detail-address step is skipped when the "no detail address"
//! box is checked.

use serde_json::json;

use crate::error::{DefinitionError, SubmissionError};
use crate::flow::{
    Condition, FlowDefinition, FlowType, FormState, InterstitialDescriptor, Normalize, Resolution,
    Rule, StepDescriptor,
};
use crate::handoff::keys;
use crate::submission::{SubmissionContext, SubmissionRequest};

pub mod steps {
    pub const INFO: u16 = 1;
    pub const BUSINESS_TYPE: u16 = 2;
    pub const COMPANY_NAME: u16 = 3;
    pub const BASE_ADDRESS: u16 = 4;
    pub const DETAIL_ADDRESS: u16 = 5;
}

pub mod interstitials {
    pub const NOTIFICATION_PERMISSION: &str = "notification_permission";
    pub const RULES_AGREEMENT: &str = "rules_agreement";
}

pub mod fields {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const BUSINESS_TYPE: &str = "business_type";
    pub const COMPANY_NAME: &str = "company_name";
    pub const BASE_ADDRESS: &str = "base_address";
    pub const NO_DETAIL_ADDRESS: &str = "no_detail_address";
    pub const DETAIL_ADDRESS: &str = "detail_address";
}

pub const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

pub fn definition() -> Result<FlowDefinition, DefinitionError> {
    use fields::*;

    FlowDefinition::builder(FlowType::EmployerSignup)
        .step(
            StepDescriptor::new(steps::INFO, "employer_info")
                .required(&[NAME, EMAIL])
                .rule(Rule::MinLength {
                    field: NAME,
                    min: 2,
                    message: "Name must be at least 2 characters.",
                })
                .rule(Rule::pattern(EMAIL, EMAIL_PATTERN, "Enter a valid email address.")?)
                .fixture(NAME, "Test Employer")
                .fixture(EMAIL, "employer@example.com"),
        )
        .step(
            StepDescriptor::new(steps::BUSINESS_TYPE, "business_type")
                .required(&[BUSINESS_TYPE])
                .rule(Rule::pattern(
                    BUSINESS_TYPE,
                    "^(business_owner|not_business_owner)$",
                    "Choose a business type.",
                )?)
                .fixture(BUSINESS_TYPE, "business_owner"),
        )
        .step(
            StepDescriptor::new(steps::COMPANY_NAME, "company_name")
                .required(&[COMPANY_NAME])
                .fixture(COMPANY_NAME, "Test Company"),
        )
        .step(
            StepDescriptor::new(steps::BASE_ADDRESS, "base_address")
                .required(&[BASE_ADDRESS])
                .fields(&[NO_DETAIL_ADDRESS])
                .fixture(BASE_ADDRESS, "166 Pangyo-ro, Seongnam")
                .fixture(NO_DETAIL_ADDRESS, true),
        )
        .step(
            StepDescriptor::new(steps::DETAIL_ADDRESS, "detail_address")
                .required(&[DETAIL_ADDRESS])
                .reachable_when(Condition::IsFalse(NO_DETAIL_ADDRESS))
                .fixture(DETAIL_ADDRESS, "3F"),
        )
        .interstitial(
            InterstitialDescriptor::confirmation(interstitials::NOTIFICATION_PERMISSION)
                .after(steps::INFO)
                .on_interstitial(Resolution::GoToSettings, interstitials::RULES_AGREEMENT)
                .on_interstitial(Resolution::Skip, interstitials::RULES_AGREEMENT),
        )
        .interstitial(
            InterstitialDescriptor::required_agreement(interstitials::RULES_AGREEMENT)
                .on_step(Resolution::Agree, steps::BUSINESS_TYPE)
                .represent_on(Resolution::Close)
                .represent_on(Resolution::Decline),
        )
        .waiver(NO_DETAIL_ADDRESS, DETAIL_ADDRESS)
        .normalize(EMAIL, Normalize::Trim)
        .submit_with(employer_signup_request)
        .writes_handoff(keys::SIGNUP_USER_ID)
        .build()
}

fn employer_signup_request(
    form: &FormState,
    ctx: &SubmissionContext<'_>,
) -> Result<Option<SubmissionRequest>, SubmissionError> {
    use fields::*;

    if !ctx.completed.is_empty() {
        return Ok(None);
    }
    let detail = if form.flag(NO_DETAIL_ADDRESS) {
        serde_json::Value::Null
    } else {
        json!(form.text(DETAIL_ADDRESS))
    };
    let body = json!({
        "name": form.text(NAME),
        "email": form.text(EMAIL),
        "business_type": form.text(BUSINESS_TYPE),
        "company_name": form.text(COMPANY_NAME),
        "address": form.text(BASE_ADDRESS),
        "address_detail": detail,
    });
    Ok(Some(SubmissionRequest::post(FlowType::EmployerSignup.endpoint(), body)))
}
