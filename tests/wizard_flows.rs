//! End-to-end tests for the signup and onboarding wizards.
//!
//! Every test drives a `FlowController` with a stub transport, so no backend
//! is needed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};

use jobflow::config::{DEFAULT_FAILURE_MESSAGE, FlowConfig};
use jobflow::controller::FlowController;
use jobflow::error::{DefinitionError, SubmissionError, TransitionError, TransportError};
use jobflow::flow::{
    Condition, FieldValue, FlowDefinition, FlowEvent, FlowPhase, FlowType, FormState,
    InterstitialDescriptor, InterstitialId, NavigationIntent, Resolution, StepDescriptor, StepId,
};
use jobflow::flows::{self, employer_signup, job_seeker_onboarding, job_seeker_signup};
use jobflow::handoff::{HandoffStore, HandoffValue, MemoryHandoffStore, keys};
use jobflow::submission::{
    FlowTransport, MISSING_USER_MESSAGE, SubmissionContext, SubmissionOutcome, SubmissionRequest,
    SubmissionStatus,
};

/// Stub transport: replays scripted responses, then answers `{"id": "user-1"}`.
#[derive(Default)]
struct StubTransport {
    responses: Mutex<VecDeque<Result<Value, TransportError>>>,
    requests: Mutex<Vec<SubmissionRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl StubTransport {
    fn replying(responses: Vec<Result<Value, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn requests(&self) -> Vec<SubmissionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FlowTransport for StubTransport {
    async fn send(
        &self,
        _flow: FlowType,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"id": "user-1"})));
        next.map(SubmissionOutcome::from_body)
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn controller(
    definition: Arc<FlowDefinition>,
    transport: Arc<StubTransport>,
    handoff: Arc<MemoryHandoffStore>,
) -> FlowController {
    init_tracing();
    FlowController::new(definition, &FlowConfig::default(), transport, handoff)
}

async fn send_all(controller: &mut FlowController, events: Vec<FlowEvent>) {
    for event in events {
        let name = format!("{event:?}");
        controller
            .dispatch(event)
            .await
            .unwrap_or_else(|e| panic!("{name} was refused: {e}"));
    }
}

/// Employer signup up to the base-address step.
async fn employer_to_base_address(controller: &mut FlowController) {
    use employer_signup::fields::*;
    send_all(
        controller,
        vec![
            FlowEvent::edit(NAME, "Kim Boss"),
            FlowEvent::edit(EMAIL, "boss@example.com"),
            FlowEvent::Advance,
            FlowEvent::Resolve(Resolution::Skip),
            FlowEvent::Resolve(Resolution::Agree),
            FlowEvent::edit(BUSINESS_TYPE, "business_owner"),
            FlowEvent::Advance,
            FlowEvent::edit(COMPANY_NAME, "Jobflow Cafe"),
            FlowEvent::Advance,
        ],
    )
    .await;
    assert_eq!(
        controller.session().phase(),
        &FlowPhase::Editing(StepId(employer_signup::steps::BASE_ADDRESS))
    );
}

/// Job-seeker signup through every step, ending in submission.
fn job_seeker_signup_events() -> Vec<FlowEvent> {
    use job_seeker_signup::fields::*;
    vec![
        FlowEvent::edit(ROLE, "job_seeker"),
        FlowEvent::Advance,
        FlowEvent::edit(NAME, " Lee Worker "),
        FlowEvent::edit(PHONE, "010-9876-5432"),
        FlowEvent::edit(BIRTHDATE, "1998-03-14"),
        FlowEvent::edit(GENDER, "female"),
        FlowEvent::edit(NATIONALITY, "VN"),
        FlowEvent::Advance,
        FlowEvent::edit(TERMS_ALL, true),
        FlowEvent::Advance,
    ]
}

/// Onboarding through every step with one experience section.
fn onboarding_events() -> Vec<FlowEvent> {
    use job_seeker_onboarding::fields::*;
    vec![
        FlowEvent::Advance,
        FlowEvent::edit(PREFERRED_REGIONS, FieldValue::list(["Seoul"])),
        FlowEvent::Advance,
        FlowEvent::edit(PREFERRED_JOBS, FieldValue::list(["cafe", "delivery"])),
        FlowEvent::Advance,
        FlowEvent::edit(AVAILABLE_DATES, FieldValue::list(["2026-11-02"])),
        FlowEvent::Advance,
        FlowEvent::edit(START_TIME, "10:00"),
        FlowEvent::edit(END_TIME, "16:00"),
        FlowEvent::edit(DAYS_OF_WEEK, FieldValue::list(["SAT", "SUN"])),
        FlowEvent::Advance,
        FlowEvent::edit(EXPERIENCE_SECTIONS, FieldValue::list([CAREER])),
        FlowEvent::Advance,
        FlowEvent::edit(CAREER, "Cafe, 1 year"),
        FlowEvent::Advance,
    ]
}

#[tokio::test]
async fn confirmation_interstitial_converges_on_skip() {
    let definition = FlowDefinition::builder(FlowType::EmployerSignup)
        .step(StepDescriptor::new(1, "info").required(&["name", "email"]))
        .step(StepDescriptor::new(2, "rules"))
        .step(StepDescriptor::new(3, "done"))
        .interstitial(
            InterstitialDescriptor::confirmation("warn")
                .after(1)
                .on_step(Resolution::Confirm, 2)
                .on_step(Resolution::Skip, 2),
        )
        .build()
        .unwrap();
    let mut controller = controller(
        Arc::new(definition),
        StubTransport::replying(vec![]),
        Arc::new(MemoryHandoffStore::new()),
    );

    send_all(
        &mut controller,
        vec![
            FlowEvent::edit("name", "Kim"),
            FlowEvent::edit("email", "kim@example.com"),
        ],
    )
    .await;
    let shown = controller.dispatch(FlowEvent::Advance).await.unwrap();
    assert_eq!(shown.to, FlowPhase::AwaitingInterstitial(InterstitialId("warn")));

    let skipped = controller
        .dispatch(FlowEvent::Resolve(Resolution::Skip))
        .await
        .unwrap();
    assert_eq!(skipped.to, FlowPhase::Editing(StepId(2)));
}

#[tokio::test]
async fn waiver_skips_conditional_step() {
    let definition = Arc::new(
        FlowDefinition::builder(FlowType::EmployerSignup)
            .step(
                StepDescriptor::new(1, "base_address")
                    .required(&["base_address"])
                    .fields(&["no_detail_address"]),
            )
            .step(
                StepDescriptor::new(2, "detail_address")
                    .required(&["detail_address"])
                    .reachable_when(Condition::IsFalse("no_detail_address")),
            )
            .step(StepDescriptor::new(3, "review"))
            .waiver("no_detail_address", "detail_address")
            .build()
            .unwrap(),
    );

    let mut waived = controller(
        Arc::clone(&definition),
        StubTransport::replying(vec![]),
        Arc::new(MemoryHandoffStore::new()),
    );
    send_all(
        &mut waived,
        vec![
            FlowEvent::edit("base_address", "166 Pangyo-ro"),
            FlowEvent::edit("no_detail_address", true),
        ],
    )
    .await;
    let transition = waived.dispatch(FlowEvent::Advance).await.unwrap();
    assert_eq!(transition.to, FlowPhase::Editing(StepId(3)));

    let mut not_waived = controller(
        definition,
        StubTransport::replying(vec![]),
        Arc::new(MemoryHandoffStore::new()),
    );
    send_all(&mut not_waived, vec![FlowEvent::edit("base_address", "166 Pangyo-ro")]).await;
    let transition = not_waived.dispatch(FlowEvent::Advance).await.unwrap();
    assert_eq!(transition.to, FlowPhase::Editing(StepId(2)));
}

#[tokio::test]
async fn network_failure_keeps_form_and_reports_error() {
    let transport = StubTransport::replying(vec![Err(TransportError::Network(
        "connection reset".to_string(),
    ))]);
    let mut controller = controller(
        flows::definition(FlowType::EmployerSignup).unwrap(),
        Arc::clone(&transport),
        Arc::new(MemoryHandoffStore::new()),
    );
    employer_to_base_address(&mut controller).await;
    send_all(
        &mut controller,
        vec![
            FlowEvent::edit(employer_signup::fields::BASE_ADDRESS, "166 Pangyo-ro"),
            FlowEvent::edit(employer_signup::fields::NO_DETAIL_ADDRESS, true),
        ],
    )
    .await;
    let before = controller.session().form().clone();

    let transition = controller.dispatch(FlowEvent::Advance).await.unwrap();
    let terminal = FlowPhase::Editing(StepId(employer_signup::steps::BASE_ADDRESS));
    assert_eq!(transition.to, terminal);
    assert_eq!(controller.session().phase(), &terminal);
    assert!(controller.session().form().contains_all(&before));
    assert_eq!(
        controller.session().last_error().unwrap().message,
        DEFAULT_FAILURE_MESSAGE
    );
    assert!(matches!(
        controller.session().submission(),
        SubmissionStatus::Failed(_)
    ));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn rules_agreement_represents_until_agreed() {
    use employer_signup::fields::*;
    let mut controller = controller(
        flows::definition(FlowType::EmployerSignup).unwrap(),
        StubTransport::replying(vec![]),
        Arc::new(MemoryHandoffStore::new()),
    );
    send_all(
        &mut controller,
        vec![
            FlowEvent::edit(NAME, "Kim Boss"),
            FlowEvent::edit(EMAIL, "boss@example.com"),
            FlowEvent::Advance,
            FlowEvent::Resolve(Resolution::GoToSettings),
        ],
    )
    .await;
    let agreement =
        FlowPhase::AwaitingInterstitial(InterstitialId(employer_signup::interstitials::RULES_AGREEMENT));
    assert_eq!(controller.session().phase(), &agreement);

    for resolution in [Resolution::Decline, Resolution::Close] {
        let transition = controller
            .dispatch(FlowEvent::Resolve(resolution))
            .await
            .unwrap();
        assert_eq!(transition.to, agreement);
    }
    controller
        .dispatch(FlowEvent::DismissInterstitial)
        .await
        .unwrap();
    assert_eq!(controller.session().phase(), &agreement);

    let err = controller
        .dispatch(FlowEvent::Resolve(Resolution::Confirm))
        .await
        .unwrap_err();
    assert!(matches!(err, TransitionError::InvalidResolution { .. }));

    // Backing out does not count as agreeing: re-entry shows the same overlay.
    let back = controller.dispatch(FlowEvent::Retreat).await.unwrap();
    assert_eq!(
        back.to,
        FlowPhase::Editing(StepId(employer_signup::steps::INFO))
    );
    let again = controller.dispatch(FlowEvent::Advance).await.unwrap();
    assert_eq!(again.to, agreement);

    let agreed = controller
        .dispatch(FlowEvent::Resolve(Resolution::Agree))
        .await
        .unwrap();
    assert_eq!(
        agreed.to,
        FlowPhase::Editing(StepId(employer_signup::steps::BUSINESS_TYPE))
    );
}

#[tokio::test]
async fn backward_navigation_preserves_every_entered_value() {
    let mut controller = controller(
        flows::definition(FlowType::EmployerSignup).unwrap(),
        StubTransport::replying(vec![]),
        Arc::new(MemoryHandoffStore::new()),
    );
    employer_to_base_address(&mut controller).await;
    send_all(
        &mut controller,
        vec![FlowEvent::edit(employer_signup::fields::BASE_ADDRESS, "166 Pangyo-ro")],
    )
    .await;
    let snapshot = controller.session().form().clone();

    for expected in [
        employer_signup::steps::COMPANY_NAME,
        employer_signup::steps::BUSINESS_TYPE,
        employer_signup::steps::INFO,
    ] {
        let transition = controller.dispatch(FlowEvent::Retreat).await.unwrap();
        assert_eq!(transition.to, FlowPhase::Editing(StepId(expected)));
        assert!(controller.session().form().contains_all(&snapshot));
    }

    // The completed interstitial chain is not shown a second time.
    let forward = controller.dispatch(FlowEvent::Advance).await.unwrap();
    assert_eq!(
        forward.to,
        FlowPhase::Editing(StepId(employer_signup::steps::BUSINESS_TYPE))
    );
}

#[tokio::test]
async fn advance_during_submission_sends_once() {
    let transport = StubTransport::slow(Duration::from_millis(100));
    let mut controller = controller(
        flows::definition(FlowType::EmployerSignup).unwrap(),
        Arc::clone(&transport),
        Arc::new(MemoryHandoffStore::new()),
    );
    employer_to_base_address(&mut controller).await;
    send_all(
        &mut controller,
        vec![
            FlowEvent::edit(employer_signup::fields::BASE_ADDRESS, "166 Pangyo-ro"),
            FlowEvent::edit(employer_signup::fields::NO_DETAIL_ADDRESS, true),
        ],
    )
    .await;

    let controller = Arc::new(tokio::sync::Mutex::new(controller));
    let press = |c: Arc<tokio::sync::Mutex<FlowController>>| async move {
        c.lock().await.dispatch(FlowEvent::Advance).await
    };
    let (first, second) = tokio::join!(
        press(Arc::clone(&controller)),
        press(Arc::clone(&controller))
    );

    let completed = [&first, &second]
        .into_iter()
        .filter(|r| matches!(r, Ok(t) if t.to == FlowPhase::Completed))
        .count();
    assert_eq!(completed, 1);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn advance_while_submitting_is_a_no_op_on_the_machine() {
    use jobflow::flow::{Effect, FlowMachine};
    use jobflow::submission::SubmissionOrchestrator;

    let transport = StubTransport::replying(vec![]);
    let mut machine = FlowMachine::new(
        flows::definition(FlowType::EmployerSignup).unwrap(),
        &FlowConfig::default().with_dev_skip(),
    );
    let mut effects = 0;
    while machine.phase() != &FlowPhase::Submitting {
        let phase = machine.phase().clone();
        let transition = match phase {
            FlowPhase::AwaitingInterstitial(id)
                if id.0 == employer_signup::interstitials::RULES_AGREEMENT =>
            {
                machine.dispatch(FlowEvent::Resolve(Resolution::Agree)).unwrap()
            }
            FlowPhase::AwaitingInterstitial(_) => {
                machine.dispatch(FlowEvent::Resolve(Resolution::Skip)).unwrap()
            }
            _ => machine.dispatch(FlowEvent::DevSkip).unwrap(),
        };
        effects += usize::from(transition.effect == Some(Effect::Submit));
    }
    for _ in 0..3 {
        let transition = machine.dispatch(FlowEvent::Advance).unwrap();
        assert_eq!(transition.effect, None);
    }
    assert_eq!(effects, 1);

    let orchestrator = SubmissionOrchestrator::new(
        transport.clone(),
        Arc::new(MemoryHandoffStore::new()),
        DEFAULT_FAILURE_MESSAGE,
    );
    let done = orchestrator.run(&mut machine).await.unwrap();
    assert_eq!(done.to, FlowPhase::Completed);
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn abandon_during_submission_is_refused_and_submission_lands() {
    use jobflow::flow::FlowMachine;
    use jobflow::submission::SubmissionOrchestrator;

    let transport = StubTransport::replying(vec![]);
    let mut machine = FlowMachine::new(
        flows::definition(FlowType::JobSeekerSignup).unwrap(),
        &FlowConfig::default().with_dev_skip(),
    );
    while machine.phase() != &FlowPhase::Submitting {
        machine.dispatch(FlowEvent::DevSkip).unwrap();
    }

    assert_eq!(
        machine.dispatch(FlowEvent::Abandon).unwrap_err(),
        TransitionError::SubmissionInFlight
    );
    assert_eq!(machine.phase(), &FlowPhase::Submitting);
    assert_eq!(machine.session().submission(), &SubmissionStatus::InFlight);

    let orchestrator = SubmissionOrchestrator::new(
        transport.clone(),
        Arc::new(MemoryHandoffStore::new()),
        DEFAULT_FAILURE_MESSAGE,
    );
    let done = orchestrator.run(&mut machine).await.unwrap();
    assert_eq!(done.to, FlowPhase::Completed);
    assert_eq!(transport.calls(), 1);
}

/// Info, a rules step whose agreement jumps straight to the last step, a
/// required detail step in between, and the last step.
fn skip_forward_definition() -> Arc<FlowDefinition> {
    Arc::new(
        FlowDefinition::builder(FlowType::EmployerSignup)
            .step(StepDescriptor::new(1, "info").required(&["name"]))
            .step(StepDescriptor::new(2, "rules"))
            .step(StepDescriptor::new(3, "detail").required(&["detail_address"]))
            .step(StepDescriptor::new(4, "done"))
            .interstitial(
                InterstitialDescriptor::required_agreement("rules_agreement")
                    .after(2)
                    .on_step(Resolution::Agree, 4)
                    .represent_on(Resolution::Close),
            )
            .build()
            .unwrap(),
    )
}

#[tokio::test]
async fn forward_moves_only_past_passing_gates_even_after_skip_forward() {
    let transport = StubTransport::replying(vec![]);
    let mut controller = controller(
        skip_forward_definition(),
        Arc::clone(&transport),
        Arc::new(MemoryHandoffStore::new()),
    );
    let events = vec![
        FlowEvent::edit("name", "Kim Boss"),
        FlowEvent::Advance,
        FlowEvent::Advance,
        FlowEvent::Resolve(Resolution::Agree),
        FlowEvent::Advance,
        FlowEvent::edit("detail_address", "3F"),
        FlowEvent::Advance,
        FlowEvent::Advance,
    ];

    let mut visited = Vec::new();
    for event in events {
        let advancing = event == FlowEvent::Advance;
        let gate = controller.gate();
        let transition = controller.dispatch(event).await.unwrap();
        if advancing
            && let (FlowPhase::Editing(from), FlowPhase::Editing(to)) =
                (&transition.from, &transition.to)
            && from != to
        {
            assert!(gate.is_some_and(|g| g.can_advance), "left step {from} with a failing gate");
            visited.push(*to);
        }
        if transition.to == FlowPhase::Submitting || transition.to == FlowPhase::Completed {
            assert_eq!(controller.session().form().text("detail_address"), "3F");
        }
    }

    // The jumped-over detail step is revisited before anything is sent.
    assert_eq!(visited, [StepId(2), StepId(3), StepId(4)]);
    assert_eq!(controller.session().phase(), &FlowPhase::Completed);
    assert_eq!(transport.calls(), 1);
    assert_eq!(transport.requests()[0].body["detail_address"], "3F");
}

#[tokio::test]
async fn signup_hands_user_id_to_onboarding() {
    let handoff = Arc::new(MemoryHandoffStore::new());

    let signup_transport = StubTransport::replying(vec![Ok(json!({
        "id": "user-7",
        "role": "job_seeker",
        "name": "Lee Worker",
        "message": "Signup successful"
    }))]);
    let mut signup = controller(
        flows::definition(FlowType::JobSeekerSignup).unwrap(),
        Arc::clone(&signup_transport),
        Arc::clone(&handoff),
    );
    let mut events = job_seeker_signup_events();
    let submit = events.pop().unwrap();
    send_all(&mut signup, events).await;
    let done = signup.dispatch(submit).await.unwrap();
    assert_eq!(done.to, FlowPhase::Completed);
    assert!(matches!(
        done.intent,
        Some(NavigationIntent::Completed(SubmissionOutcome { ref id, .. })) if id.as_deref() == Some("user-7")
    ));

    let sent = &signup_transport.requests()[0];
    assert_eq!(sent.endpoint, "/auth/signup");
    assert_eq!(sent.body["name"], "Lee Worker");
    assert_eq!(sent.body["phone"], "01098765432");
    assert_eq!(sent.body["terms"]["sms_optional"], true);

    let stored = handoff.read_handoff(keys::SIGNUP_USER_ID).await.unwrap().unwrap();
    assert_eq!(stored.value, "user-7");
    assert_eq!(stored.written_by, FlowType::JobSeekerSignup);

    let onboarding_transport = StubTransport::replying(vec![]);
    let mut onboarding = controller(
        flows::definition(FlowType::JobSeekerOnboarding).unwrap(),
        Arc::clone(&onboarding_transport),
        Arc::clone(&handoff),
    );
    send_all(&mut onboarding, onboarding_events()).await;
    assert_eq!(onboarding.session().phase(), &FlowPhase::Completed);

    let profile = &onboarding_transport.requests()[0];
    assert_eq!(profile.endpoint, "/job-seeker/profile");
    assert_eq!(profile.body["user_id"], "user-7");
    assert_eq!(profile.body["work_schedule"]["days_of_week"], json!(["SAT", "SUN"]));
    assert_eq!(profile.body["preferred_jobs"], json!(["cafe", "delivery"]));

    // Consumed once the profile is saved.
    assert!(handoff.read_handoff(keys::SIGNUP_USER_ID).await.unwrap().is_none());
}

#[tokio::test]
async fn onboarding_without_signup_fails_before_calling_backend() {
    let transport = StubTransport::replying(vec![]);
    let mut onboarding = controller(
        flows::definition(FlowType::JobSeekerOnboarding).unwrap(),
        Arc::clone(&transport),
        Arc::new(MemoryHandoffStore::new()),
    );
    send_all(&mut onboarding, onboarding_events()).await;

    assert_eq!(
        onboarding.session().phase(),
        &FlowPhase::Editing(StepId(job_seeker_onboarding::steps::EXPERIENCE_DETAIL))
    );
    assert_eq!(
        onboarding.session().last_error().unwrap().message,
        MISSING_USER_MESSAGE
    );
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn backend_detail_is_shown_and_retry_succeeds() {
    let transport = StubTransport::replying(vec![Err(TransportError::Status {
        code: 400,
        detail: Some("Phone number already registered".to_string()),
    })]);
    let mut signup = controller(
        flows::definition(FlowType::JobSeekerSignup).unwrap(),
        Arc::clone(&transport),
        Arc::new(MemoryHandoffStore::new()),
    );
    send_all(&mut signup, job_seeker_signup_events()).await;

    let terms = FlowPhase::Editing(StepId(job_seeker_signup::steps::TERMS));
    assert_eq!(signup.session().phase(), &terms);
    assert_eq!(
        signup.session().last_error().unwrap().message,
        "Phone number already registered"
    );

    let retried = signup.dispatch(FlowEvent::Advance).await.unwrap();
    assert_eq!(retried.from, terms);
    assert_eq!(retried.to, FlowPhase::Completed);
    assert!(signup.session().last_error().is_none());
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn employer_role_branches_without_submitting() {
    let transport = StubTransport::replying(vec![]);
    let mut signup = controller(
        flows::definition(FlowType::JobSeekerSignup).unwrap(),
        Arc::clone(&transport),
        Arc::new(MemoryHandoffStore::new()),
    );
    signup
        .dispatch(FlowEvent::edit(job_seeker_signup::fields::ROLE, "employer"))
        .await
        .unwrap();
    let transition = signup.dispatch(FlowEvent::Advance).await.unwrap();

    assert_eq!(transition.to, FlowPhase::Branched(FlowType::EmployerSignup));
    assert_eq!(
        transition.intent,
        Some(NavigationIntent::Branch(FlowType::EmployerSignup))
    );
    assert!(signup.dispatch(FlowEvent::Retreat).await.is_err());
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn dev_skip_walks_the_whole_flow_when_enabled() {
    init_tracing();
    let transport = StubTransport::replying(vec![]);
    let mut signup = FlowController::new(
        flows::definition(FlowType::JobSeekerSignup).unwrap(),
        &FlowConfig::default().with_dev_skip(),
        transport.clone(),
        Arc::new(MemoryHandoffStore::new()),
    );
    for _ in 0..3 {
        signup.dispatch(FlowEvent::DevSkip).await.unwrap();
    }
    assert_eq!(signup.session().phase(), &FlowPhase::Completed);

    let body = &transport.requests()[0].body;
    assert_eq!(body["name"], "Test User");
    assert_eq!(body["terms"]["tos_required"], true);

    let mut locked = controller(
        flows::definition(FlowType::JobSeekerSignup).unwrap(),
        StubTransport::replying(vec![]),
        Arc::new(MemoryHandoffStore::new()),
    );
    assert_eq!(
        locked.dispatch(FlowEvent::DevSkip).await.unwrap_err(),
        TransitionError::DevSkipDisabled
    );
}

fn account_then_profile(
    form: &FormState,
    ctx: &SubmissionContext<'_>,
) -> Result<Option<SubmissionRequest>, SubmissionError> {
    match ctx.completed {
        [] => Ok(Some(SubmissionRequest::post(
            "/auth/signup/employer",
            json!({"name": form.text("name")}),
        ))),
        [account] => {
            let user_id = account
                .id
                .clone()
                .ok_or_else(|| SubmissionError::Payload("signup returned no id".to_string()))?;
            Ok(Some(SubmissionRequest::post(
                "/employer/profile",
                json!({"user_id": user_id}),
            )))
        }
        _ => Ok(None),
    }
}

#[tokio::test]
async fn retry_resumes_after_the_last_successful_call() {
    let transport = StubTransport::replying(vec![
        Ok(json!({"id": "emp-1"})),
        Err(TransportError::Timeout(Duration::from_secs(15))),
        Ok(json!({"id": "profile-1"})),
    ]);
    let handoff = Arc::new(MemoryHandoffStore::new());
    let definition = FlowDefinition::builder(FlowType::EmployerSignup)
        .step(StepDescriptor::new(1, "info").required(&["name"]))
        .submit_with(account_then_profile)
        .writes_handoff(keys::SIGNUP_USER_ID)
        .build()
        .unwrap();
    let mut controller = controller(Arc::new(definition), Arc::clone(&transport), Arc::clone(&handoff));

    controller
        .dispatch(FlowEvent::edit("name", "Kim Boss"))
        .await
        .unwrap();
    let failed = controller.dispatch(FlowEvent::Advance).await.unwrap();
    assert_eq!(failed.to, FlowPhase::Editing(StepId(1)));
    assert_eq!(controller.session().completed_requests().len(), 1);

    let done = controller.dispatch(FlowEvent::Advance).await.unwrap();
    assert_eq!(done.to, FlowPhase::Completed);

    let endpoints: Vec<String> = transport
        .requests()
        .into_iter()
        .map(|r| r.endpoint)
        .collect();
    assert_eq!(
        endpoints,
        ["/auth/signup/employer", "/employer/profile", "/employer/profile"]
    );
    assert_eq!(transport.requests()[2].body["user_id"], "emp-1");

    // The account id, not the profile id, is handed off.
    let stored = handoff.read_handoff(keys::SIGNUP_USER_ID).await.unwrap().unwrap();
    assert_eq!(stored.value, "emp-1");
}

#[tokio::test]
async fn handoff_written_before_this_run_is_replaced() {
    let handoff = Arc::new(MemoryHandoffStore::new());
    handoff
        .write_handoff(
            keys::SIGNUP_USER_ID,
            HandoffValue::new("stale", FlowType::EmployerSignup),
        )
        .await
        .unwrap();
    let mut signup = controller(
        flows::definition(FlowType::JobSeekerSignup).unwrap(),
        StubTransport::replying(vec![Ok(json!({"id": 31}))]),
        Arc::clone(&handoff),
    );
    send_all(&mut signup, job_seeker_signup_events()).await;

    let stored = handoff.read_handoff(keys::SIGNUP_USER_ID).await.unwrap().unwrap();
    assert_eq!(stored.value, "31");
}

#[test]
fn misconfigured_tables_fail_at_construction() {
    let unreachable = FlowDefinition::builder(FlowType::JobSeekerOnboarding)
        .step(StepDescriptor::new(2, "basic_info"))
        .step(StepDescriptor::new(3, "detail").reachable_when(Condition::Filled("sections")))
        .build()
        .unwrap_err();
    assert!(matches!(
        unreachable,
        DefinitionError::UnreachableStep { step: StepId(3), .. }
    ));

    let never_agrees = FlowDefinition::builder(FlowType::EmployerSignup)
        .step(StepDescriptor::new(1, "info"))
        .step(StepDescriptor::new(2, "rules"))
        .interstitial(
            InterstitialDescriptor::required_agreement("rules_agreement")
                .after(1)
                .represent_on(Resolution::Close),
        )
        .build()
        .unwrap_err();
    assert!(matches!(
        never_agrees,
        DefinitionError::InterstitialMisconfiguration { .. }
    ));
}
