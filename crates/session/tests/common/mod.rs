//! Shared fixtures for the engine integration tests: a scripted
//! in-process [`ResponseGateway`] plus questionnaire and session
//! builders wired the way the runner wires production sessions.

// Each test binary compiles its own copy of this module and uses a
// different subset of the helpers.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;

use fieldwork_core::question::{AnswerValue, Question, QuestionKind};
use fieldwork_core::questionnaire::{
    Questionnaire, QuestionnaireKind, QuestionnaireSettings, Section,
};
use fieldwork_core::{AnswerMap, LaunchParams};
use fieldwork_events::{EventBus, SessionEvent};
use fieldwork_platform::types::{
    EncryptedLinkValidation, GeneratedLinkValidation, LinkStagedRequest, PollAnswerOutcome,
    PollAnswerRequest, RegisterOutcome, RegisterRequest, RegistrationData, SaveOutcome,
    SaveProgressRequest, SavedProgress, StageRequest, SubmissionReceipt, SubmitOutcome,
    SubmitRequest, TokenParticipant, TokenValidation, VideoProgress, VideoProgressQuery,
    VideoProgressRequest,
};
use fieldwork_platform::{PlatformApiError, ResponseGateway};
use fieldwork_session::{EngineConfig, EngineError, SessionEngine};
use fieldwork_store::{MemoryStore, ScopedStore};

/// Questionnaire id used by every fixture.
pub const QUESTIONNAIRE_ID: &str = "act-7";

// ---------------------------------------------------------------------------
// Scripted gateway
// ---------------------------------------------------------------------------

/// In-process stand-in for the collaborator backend.
///
/// Scripted responses live in `Mutex<Option<_>>` fields: outcome enums
/// are consumed with `take()` (script the next call, later calls fall
/// back to a benign default), plain data is cloned out. The `fail_*`
/// switches make an endpoint answer with a 500 instead. Every request
/// the engine sends is recorded for assertions.
#[derive(Default)]
pub struct StubGateway {
    pub questionnaire: Mutex<Option<Questionnaire>>,
    pub token_validation: Mutex<Option<TokenValidation>>,
    pub generated_link: Mutex<Option<GeneratedLinkValidation>>,
    pub encrypted_link: Mutex<Option<EncryptedLinkValidation>>,
    pub register_outcome: Mutex<Option<RegisterOutcome>>,
    pub saved_progress: Mutex<Option<SavedProgress>>,
    pub submit_outcome: Mutex<Option<SubmitOutcome>>,
    pub poll_outcome: Mutex<Option<PollAnswerOutcome>>,
    pub linked_answers: Mutex<Option<AnswerMap>>,
    pub video_progress: Mutex<Option<VideoProgress>>,

    pub fail_token_validation: AtomicBool,
    pub fail_register: AtomicBool,
    pub fail_save: AtomicBool,
    /// Autosaves answer 409 instead of saving.
    pub conflict_save: AtomicBool,
    pub fail_submit: AtomicBool,
    pub fail_poll: AtomicBool,
    pub fail_stage: AtomicBool,
    pub fail_link: AtomicBool,

    pub register_requests: Mutex<Vec<RegisterRequest>>,
    pub save_requests: Mutex<Vec<SaveProgressRequest>>,
    pub submit_requests: Mutex<Vec<SubmitRequest>>,
    pub poll_requests: Mutex<Vec<PollAnswerRequest>>,
    pub stage_requests: Mutex<Vec<StageRequest>>,
    pub link_requests: Mutex<Vec<LinkStagedRequest>>,
    pub used_tokens: Mutex<Vec<String>>,
    /// (token, participant_id, response_id) triples from `mark_link_used`.
    pub used_links: Mutex<Vec<(String, String, String)>>,
    pub video_reports: Mutex<Vec<VideoProgressRequest>>,
}

/// The error every `fail_*` switch produces.
pub fn backend_error() -> PlatformApiError {
    PlatformApiError::Api {
        status: 500,
        body: "stub backend failure".to_string(),
    }
}

#[async_trait]
impl ResponseGateway for StubGateway {
    async fn validate_access_token(
        &self,
        _token: &str,
    ) -> Result<TokenValidation, PlatformApiError> {
        if self.fail_token_validation.load(Ordering::SeqCst) {
            return Err(backend_error());
        }
        Ok(self
            .token_validation
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(TokenValidation {
                valid: false,
                already_completed: false,
                participant: None,
            }))
    }

    async fn validate_generated_link(
        &self,
        _token: &str,
    ) -> Result<GeneratedLinkValidation, PlatformApiError> {
        Ok(self
            .generated_link
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(GeneratedLinkValidation {
                valid: false,
                data: None,
                message: None,
            }))
    }

    async fn validate_encrypted_link(
        &self,
        _token: &str,
    ) -> Result<EncryptedLinkValidation, PlatformApiError> {
        Ok(self
            .encrypted_link
            .lock()
            .unwrap()
            .clone()
            .unwrap_or(EncryptedLinkValidation { link_type: None }))
    }

    async fn fetch_questionnaire(
        &self,
        _questionnaire_id: &str,
    ) -> Result<Questionnaire, PlatformApiError> {
        self.questionnaire
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| PlatformApiError::Api {
                status: 404,
                body: "no questionnaire scripted".to_string(),
            })
    }

    async fn register_participant(
        &self,
        _questionnaire_id: &str,
        request: &RegisterRequest,
    ) -> Result<RegisterOutcome, PlatformApiError> {
        self.register_requests.lock().unwrap().push(request.clone());
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(backend_error());
        }
        Ok(self
            .register_outcome
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| RegisterOutcome::Registered(registered("p-stub"))))
    }

    async fn save_progress(
        &self,
        _questionnaire_id: &str,
        request: &SaveProgressRequest,
    ) -> Result<SaveOutcome, PlatformApiError> {
        self.save_requests.lock().unwrap().push(request.clone());
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(backend_error());
        }
        if self.conflict_save.load(Ordering::SeqCst) {
            return Ok(SaveOutcome::AlreadySubmitted);
        }
        Ok(SaveOutcome::Saved)
    }

    async fn load_progress(
        &self,
        _questionnaire_id: &str,
        _participant_id: &str,
    ) -> Result<Option<SavedProgress>, PlatformApiError> {
        Ok(self.saved_progress.lock().unwrap().clone())
    }

    async fn submit_response(
        &self,
        _questionnaire_id: &str,
        request: &SubmitRequest,
    ) -> Result<SubmitOutcome, PlatformApiError> {
        self.submit_requests.lock().unwrap().push(request.clone());
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(backend_error());
        }
        Ok(self
            .submit_outcome
            .lock()
            .unwrap()
            .take()
            .unwrap_or_else(|| SubmitOutcome::Submitted(receipt(1))))
    }

    async fn submit_poll_answer(
        &self,
        _questionnaire_id: &str,
        request: &PollAnswerRequest,
    ) -> Result<PollAnswerOutcome, PlatformApiError> {
        self.poll_requests.lock().unwrap().push(request.clone());
        if self.fail_poll.load(Ordering::SeqCst) {
            return Err(backend_error());
        }
        Ok(self
            .poll_outcome
            .lock()
            .unwrap()
            .take()
            .unwrap_or(PollAnswerOutcome::AlreadyAnswered))
    }

    async fn stage_submission(
        &self,
        _questionnaire_id: &str,
        request: &StageRequest,
    ) -> Result<String, PlatformApiError> {
        self.stage_requests.lock().unwrap().push(request.clone());
        if self.fail_stage.load(Ordering::SeqCst) {
            return Err(backend_error());
        }
        Ok(request.session_token.clone())
    }

    async fn link_staged_submission(
        &self,
        _questionnaire_id: &str,
        request: &LinkStagedRequest,
    ) -> Result<AnswerMap, PlatformApiError> {
        self.link_requests.lock().unwrap().push(request.clone());
        if self.fail_link.load(Ordering::SeqCst) {
            return Err(backend_error());
        }
        Ok(self.linked_answers.lock().unwrap().clone().unwrap_or_default())
    }

    async fn mark_token_used(&self, token: &str) -> Result<(), PlatformApiError> {
        self.used_tokens.lock().unwrap().push(token.to_string());
        Ok(())
    }

    async fn mark_link_used(
        &self,
        token: &str,
        participant_id: &str,
        response_id: &str,
    ) -> Result<(), PlatformApiError> {
        self.used_links.lock().unwrap().push((
            token.to_string(),
            participant_id.to_string(),
            response_id.to_string(),
        ));
        Ok(())
    }

    async fn record_video_progress(
        &self,
        request: &VideoProgressRequest,
    ) -> Result<(), PlatformApiError> {
        self.video_reports.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn fetch_video_progress(
        &self,
        _query: &VideoProgressQuery,
    ) -> Result<Option<VideoProgress>, PlatformApiError> {
        Ok(self.video_progress.lock().unwrap().clone())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// One test session's wiring: stub gateway, in-memory store, event bus.
pub struct Harness {
    pub gateway: Arc<StubGateway>,
    pub store: Arc<MemoryStore>,
    pub bus: Arc<EventBus>,
}

impl Harness {
    /// Harness with `questionnaire` scripted as the fetch response.
    pub fn new(questionnaire: Questionnaire) -> Self {
        let gateway = Arc::new(StubGateway::default());
        *gateway.questionnaire.lock().unwrap() = Some(questionnaire);
        Self {
            gateway,
            store: Arc::new(MemoryStore::new()),
            bus: Arc::new(EventBus::default()),
        }
    }

    /// Launch an engine with the default config, panicking on failure.
    pub async fn launch(&self, params: &LaunchParams) -> SessionEngine {
        self.try_launch(params)
            .await
            .expect("launch should succeed")
    }

    pub async fn try_launch(&self, params: &LaunchParams) -> Result<SessionEngine, EngineError> {
        self.launch_with(&EngineConfig::default(), params).await
    }

    /// Launch with an explicit config (poll fallback switches etc.).
    pub async fn launch_with(
        &self,
        config: &EngineConfig,
        params: &LaunchParams,
    ) -> Result<SessionEngine, EngineError> {
        SessionEngine::launch(
            Arc::clone(&self.gateway) as Arc<dyn ResponseGateway>,
            Arc::clone(&self.store) as Arc<dyn ScopedStore>,
            Arc::clone(&self.bus),
            config,
            QUESTIONNAIRE_ID,
            params,
        )
        .await
    }
}

/// Give spawned fire-and-forget tasks (autosaves, token burns) a chance
/// to run to completion on the current-thread test runtime.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// Pull everything currently buffered on an event subscription.
pub fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ---------------------------------------------------------------------------
// Questionnaire fixtures
// ---------------------------------------------------------------------------

pub fn questionnaire(kind: QuestionnaireKind, questions: Vec<Question>) -> Questionnaire {
    Questionnaire {
        id: QUESTIONNAIRE_ID.to_string(),
        title: "Fixture".to_string(),
        kind,
        sections: vec![section("s1", questions)],
        settings: QuestionnaireSettings::default(),
    }
}

pub fn section(id: &str, questions: Vec<Question>) -> Section {
    Section {
        id: id.to_string(),
        title: format!("Section {id}"),
        questions,
    }
}

pub fn text_question(id: &str, required: Option<bool>) -> Question {
    Question {
        id: id.to_string(),
        title: format!("Question {id}"),
        kind: QuestionKind::ShortText,
        required,
        comment_enabled: false,
        rules: None,
        order: 0,
    }
}

pub fn choice_question(id: &str, options: &[&str], correct: &[usize]) -> Question {
    Question {
        id: id.to_string(),
        title: format!("Question {id}"),
        kind: QuestionKind::SingleChoice {
            options: options.iter().map(|s| s.to_string()).collect(),
            correct: correct.to_vec(),
            other_option: false,
        },
        required: None,
        comment_enabled: false,
        rules: None,
        order: 0,
    }
}

pub fn rating_question(id: &str, max: u8) -> Question {
    Question {
        id: id.to_string(),
        title: format!("Question {id}"),
        kind: QuestionKind::Rating { max },
        required: None,
        comment_enabled: false,
        rules: None,
        order: 0,
    }
}

/// Two required short-text questions in one section.
pub fn survey() -> Questionnaire {
    questionnaire(
        QuestionnaireKind::Survey,
        vec![text_question("q1", Some(true)), text_question("q2", Some(true))],
    )
}

/// Two scored single-choice questions; pass at 50%, two attempts.
/// Correct answers are `c1 = "Green"` and `c2 = "Yes"`.
pub fn assessment() -> Questionnaire {
    let mut q = questionnaire(
        QuestionnaireKind::Assessment,
        vec![
            choice_question("c1", &["Red", "Green", "Blue"], &[1]),
            choice_question("c2", &["Yes", "No"], &[0]),
        ],
    );
    q.settings.pass_percentage = Some(50.0);
    q.settings.max_attempts = Some(2);
    q
}

/// One choice question, no correct set.
pub fn poll() -> Questionnaire {
    questionnaire(
        QuestionnaireKind::Poll,
        vec![choice_question("p1", &["Cats", "Dogs", "Ferrets"], &[])],
    )
}

pub fn text(value: &str) -> AnswerValue {
    AnswerValue::Text(value.to_string())
}

// ---------------------------------------------------------------------------
// Launch parameter and wire-payload fixtures
// ---------------------------------------------------------------------------

pub fn anonymous_params() -> LaunchParams {
    LaunchParams::from_query("mode=anonymous")
}

pub fn token_params(token: &str) -> LaunchParams {
    LaunchParams::from_query(&format!("token={token}"))
}

/// A valid participant token with name and email prefilled (the
/// auto-advance case).
pub fn full_participant_token(id: &str) -> TokenValidation {
    TokenValidation {
        valid: true,
        already_completed: false,
        participant: Some(TokenParticipant {
            id: Some(id.to_string()),
            name: Some("Ada Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            phone: None,
            language: None,
            additional_data: BTreeMap::new(),
        }),
    }
}

pub fn registered(id: &str) -> RegistrationData {
    RegistrationData {
        participant_id: id.to_string(),
        has_submitted: false,
        attempt_count: 0,
        can_retake: false,
        retakes_remaining: None,
        time_limit_minutes: None,
        existing_response: None,
    }
}

pub fn receipt(attempt_number: u32) -> SubmissionReceipt {
    SubmissionReceipt {
        response_id: Some(format!("resp-{attempt_number}")),
        attempt_number,
        score: None,
        assessment_result: None,
        correct_answers_count: None,
        total_questions: None,
        retakes_remaining: None,
        can_retake: false,
    }
}
