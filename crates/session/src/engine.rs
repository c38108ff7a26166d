//! The session engine: one participant's run through a questionnaire.
//!
//! [`SessionEngine`] owns the mutable session state and orchestrates the
//! pure domain logic in `fieldwork_core` against the three effectful
//! seams: the backend [`ResponseGateway`], the scoped snapshot store,
//! and the event bus. Every committed mutation persists a snapshot
//! synchronously before the call returns; backend writes ride behind it
//! as fire-and-forget autosaves so a flaky network never blocks
//! answering.
//!
//! Lifecycle: [`SessionEngine::launch`] resolves identity and restores
//! or starts the session, gate methods ([`begin`](SessionEngine::begin),
//! [`register`](SessionEngine::register),
//! [`finish_intro`](SessionEngine::finish_intro)) move it to
//! `InProgress`, answering and navigation mutate it, and
//! [`submit`](SessionEngine::submit) /
//! [`force_submit`](SessionEngine::force_submit) land it on a terminal
//! phase.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use fieldwork_core::access::{
    self, guest_participant_id, staging_token, AccessMode, Identity, LaunchParams, Resolution,
};
use fieldwork_core::comments::{comment_allowed, validate_comment};
use fieldwork_core::completeness;
use fieldwork_core::localization::{self, LanguageRequirement};
use fieldwork_core::navigation::{self, NavOutcome, Pointer};
use fieldwork_core::phase::{state_machine, SessionPhase};
use fieldwork_core::poll::{self, PollOutcome};
use fieldwork_core::question::{AnswerMap, AnswerValue, Question};
use fieldwork_core::questionnaire::{Questionnaire, RegistrationFlow};
use fieldwork_core::registration::RegistrationForm;
use fieldwork_core::scoring::{self, AnswerFeedback, AssessmentOutcome, Verdict};
use fieldwork_core::snapshot::{SessionSnapshot, SnapshotScope};
use fieldwork_core::types::{EpochMillis, QuestionId};
use fieldwork_core::video::{self, ResumeOffer};
use fieldwork_core::visibility::{filter_sections, SectionView};
use fieldwork_core::CoreError;
use fieldwork_events::bus::{names, EventBus, SessionEvent};
use fieldwork_platform::types::{
    LinkStagedRequest, PollAnswerOutcome, PollAnswerRequest, RegisterOutcome, RegisterRequest,
    RegistrationData, SaveOutcome, SaveProgressRequest, StageRequest, SubmissionReceipt,
    SubmitOutcome, SubmitRequest, VideoProgressQuery, VideoProgressRequest,
};
use fieldwork_platform::{PlatformApiError, ResponseGateway};
use fieldwork_store::{RestoreDecision, ScopedStore, SnapshotRepo, StagingRepo, StoreError};

use crate::config::EngineConfig;
use crate::identity::{gather_findings, token_identity, LaunchFindings};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error surface of the session engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] PlatformApiError),

    /// The participant must act before the operation can proceed:
    /// unanswered required questions, an unwatched mandatory video, a
    /// missing language choice. The message is participant-safe.
    #[error("{0}")]
    Blocked(String),
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Mutable session state: the persisted snapshot fields plus the
/// transients that reset on reload.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub phase: SessionPhase,
    pub access_mode: AccessMode,
    pub identity: Identity,
    pub pointer: Pointer,
    pub answers: AnswerMap,
    pub comments: BTreeMap<QuestionId, String>,
    /// Questions locked in (per-question assessment submits, poll votes).
    pub submitted_question_ids: BTreeSet<QuestionId>,
    pub assessment_result: Option<AssessmentOutcome>,
    pub selected_language: Option<String>,
    pub submitted: bool,
    /// 1-based attempt number; corrected by backend receipts.
    pub attempt: u32,
    pub started_at: EpochMillis,
    /// Backend response id, once one is known.
    pub response_id: Option<String>,
    /// Intro video watch fraction. Transient: reloading re-watches.
    pub intro_watched: f64,
}

impl SessionState {
    fn new(identity: Identity, access_mode: AccessMode, now_ms: EpochMillis) -> Self {
        Self {
            phase: SessionPhase::Unresolved,
            access_mode,
            identity,
            pointer: Pointer::default(),
            answers: AnswerMap::new(),
            comments: BTreeMap::new(),
            submitted_question_ids: BTreeSet::new(),
            assessment_result: None,
            selected_language: None,
            submitted: false,
            attempt: 1,
            started_at: now_ms,
            response_id: None,
            intro_watched: 0.0,
        }
    }

    fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        // The attempt number is not persisted locally; a recorded outcome
        // carries it, and the next backend receipt corrects it otherwise.
        let attempt = snapshot.assessment_result.as_ref().map_or(1, |r| r.attempt);
        Self {
            phase: snapshot.phase,
            access_mode: snapshot.access_mode,
            identity: snapshot.identity,
            pointer: snapshot.pointer,
            answers: snapshot.answers,
            comments: snapshot.comments,
            submitted_question_ids: snapshot.submitted_question_ids,
            assessment_result: snapshot.assessment_result,
            selected_language: snapshot.selected_language,
            submitted: snapshot.submitted,
            attempt,
            started_at: snapshot.started_at,
            response_id: None,
            intro_watched: 0.0,
        }
    }

    fn to_snapshot(&self, now_ms: EpochMillis) -> SessionSnapshot {
        SessionSnapshot {
            identity: self.identity.clone(),
            access_mode: self.access_mode,
            phase: self.phase,
            pointer: self.pointer,
            answers: self.answers.clone(),
            comments: self.comments.clone(),
            submitted_question_ids: self.submitted_question_ids.clone(),
            assessment_result: self.assessment_result.clone(),
            selected_language: self.selected_language.clone(),
            submitted: self.submitted,
            started_at: self.started_at,
            saved_at: now_ms,
        }
    }
}

/// What came of a [`SessionEngine::submit`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitDisposition {
    /// The response is in and the session reached a terminal phase.
    /// Assessments carry their outcome; surveys and polls carry `None`.
    Completed { outcome: Option<AssessmentOutcome> },
    /// Answers were staged on the backend; registration must run before
    /// the response can be finalized (post-submission flow).
    RegistrationRequired,
}

/// Which mark-used endpoint the launch token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenRole {
    Participant,
    GeneratedLink,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct SessionEngine {
    questionnaire: Questionnaire,
    gateway: Arc<dyn ResponseGateway>,
    store: Arc<dyn ScopedStore>,
    bus: Arc<EventBus>,
    scope: SnapshotScope,
    synthesize_poll_fallback: bool,
    /// Raw launch token, burned after a successful submission.
    launch_token: Option<String>,
    token_role: Option<TokenRole>,
    /// Set by a background autosave that found the response already
    /// submitted; absorbed at the start of the next mutating call.
    backend_conflict: Arc<AtomicBool>,
    state: SessionState,
}

impl SessionEngine {
    /// Resolve identity, restore or start the session, and return the
    /// ready engine.
    ///
    /// Only the questionnaire fetch and its structural validation are
    /// fatal here. Token validation, snapshot restore, and the staged
    /// submission return leg all degrade with a warning instead of
    /// failing the launch.
    pub async fn launch(
        gateway: Arc<dyn ResponseGateway>,
        store: Arc<dyn ScopedStore>,
        bus: Arc<EventBus>,
        config: &EngineConfig,
        questionnaire_id: &str,
        params: &LaunchParams,
    ) -> Result<Self, EngineError> {
        let questionnaire = gateway.fetch_questionnaire(questionnaire_id).await?;
        questionnaire.validate()?;

        let findings = gather_findings(gateway.as_ref(), params).await;
        let preset_language = findings
            .findings
            .participant
            .as_ref()
            .and_then(|p| p.language.clone());
        let needs_choice = localization::needs_language_choice(
            &questionnaire.settings.languages,
            preset_language.as_deref(),
        );
        let resolution = access::resolve(params, &findings.findings, needs_choice);
        let access_mode = resolution.access_mode();

        let token_role = if findings.findings.participant.is_some() {
            Some(TokenRole::Participant)
        } else if findings.findings.generated_link.is_some() {
            Some(TokenRole::GeneratedLink)
        } else {
            None
        };

        let now = Utc::now().timestamp_millis();
        let mut engine = Self {
            scope: SnapshotScope::for_mode(access_mode),
            synthesize_poll_fallback: config.synthesize_poll_fallback,
            launch_token: params.access_token().map(str::to_string),
            token_role,
            backend_conflict: Arc::new(AtomicBool::new(false)),
            state: SessionState::new(Identity::default(), access_mode, now),
            questionnaire,
            gateway,
            store,
            bus,
        };

        tracing::info!(
            questionnaire_id,
            access_mode = access_mode.name(),
            scope = engine.scope.name(),
            "Resolved session access"
        );

        // Return leg of the post-submission registration flow: link the
        // staged answers to the participant the registration created and
        // finalize. Any failure falls through to a normal start.
        if params.returning_submitted
            && engine.questionnaire.settings.registration_flow == RegistrationFlow::PostSubmission
        {
            match params.participant_id.as_deref() {
                Some(participant_id) => {
                    if engine.finalize_staged_return(participant_id).await {
                        engine.publish_resolved(false);
                        return Ok(engine);
                    }
                }
                None => {
                    tracing::warn!("Returning submitted launch carried no participant id");
                }
            }
        }

        // Previews never persist, and a token-known completion outranks
        // whatever a local snapshot says.
        let try_restore = !matches!(
            resolution,
            Resolution::PreviewStart | Resolution::AlreadyCompleted { .. }
        );
        if try_restore {
            let decision = match SnapshotRepo::restore_decision(
                engine.store.as_ref(),
                engine.scope,
                &engine.questionnaire.id,
                now,
            ) {
                Ok(decision) => decision,
                Err(e) => {
                    tracing::warn!(error = %e, "Snapshot restore failed; starting fresh");
                    RestoreDecision::Fresh
                }
            };
            match decision {
                RestoreDecision::Fresh => {}
                RestoreDecision::Resume(snapshot)
                | RestoreDecision::AlreadySubmitted(snapshot) => {
                    if engine.snapshot_matches_identity(&snapshot, &resolution, params) {
                        engine.adopt_snapshot(snapshot);
                        engine.publish_resolved(true);
                        return Ok(engine);
                    }
                    tracing::info!("Snapshot belongs to a different participant; discarding");
                    if let Err(e) = SnapshotRepo::clear(
                        engine.store.as_ref(),
                        engine.scope,
                        &engine.questionnaire.id,
                    ) {
                        tracing::warn!(error = %e, "Could not clear the mismatched snapshot");
                    }
                }
            }
        }

        engine
            .start_fresh(resolution, &findings, preset_language)
            .await?;
        engine.publish_resolved(false);
        Ok(engine)
    }

    // ---- accessors ----

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn questionnaire(&self) -> &Questionnaire {
        &self.questionnaire
    }

    pub fn scope(&self) -> SnapshotScope {
        self.scope
    }

    /// Sections currently visible under the conditional-logic rules.
    pub fn visible_sections(&self) -> Vec<SectionView<'_>> {
        filter_sections(&self.questionnaire.sections, &self.state.answers)
    }

    /// The question under the (clamped) pointer, if any are visible.
    pub fn current_question(&self) -> Option<&Question> {
        let views = self.visible_sections();
        let pointer = navigation::clamp(self.state.pointer, &views);
        views
            .get(pointer.section)
            .and_then(|view| view.questions.get(pointer.question))
            .copied()
    }

    /// Percent of visible sections completed, by pointer position.
    pub fn progress_percent(&self) -> u32 {
        navigation::section_progress_percent(self.state.pointer, &self.visible_sections())
    }

    /// Seconds left on the time limit, `None` when untimed.
    pub fn remaining_secs(&self, now_ms: EpochMillis) -> Option<u64> {
        self.questionnaire
            .time_limit_secs()
            .map(|limit| fieldwork_core::deadline::remaining_secs(limit, self.state.started_at, now_ms))
    }

    // ---- gates ----

    /// Record an explicit language choice.
    pub fn select_language(&mut self, choice: &str) -> Result<(), EngineError> {
        localization::validate_selection(&self.questionnaire.settings.languages, choice)?;
        self.state.selected_language = Some(choice.to_string());
        self.persist()
    }

    /// Move past the start gate the session is waiting at.
    ///
    /// Anonymous sessions register their pseudonymous identity first;
    /// token sessions pick up any server-side progress. Registration
    /// sessions must go through [`register`](Self::register) instead.
    pub async fn begin(&mut self) -> Result<(), EngineError> {
        self.absorb_conflict()?;
        if let LanguageRequirement::ChoiceRequired(languages) = localization::language_requirement(
            &self.questionnaire.settings.languages,
            self.state.selected_language.as_deref(),
        ) {
            return Err(EngineError::Blocked(format!(
                "Please choose a language before starting ({})",
                languages.join(", ")
            )));
        }

        match self.state.phase {
            SessionPhase::AnonymousGate => {
                if self.state.access_mode == AccessMode::Anonymous
                    && !self.register_anonymous().await?
                {
                    return Ok(());
                }
                self.merge_server_progress().await;
                self.leave_gate()
            }
            SessionPhase::TokenGate => {
                self.merge_server_progress().await;
                self.leave_gate()
            }
            SessionPhase::PreviewGate => self.leave_gate(),
            SessionPhase::Registration => Err(CoreError::Conflict(
                "Registration requires the participant form".to_string(),
            )
            .into()),
            other => Err(CoreError::Conflict(format!(
                "Session is not waiting at a start gate (phase: {})",
                other.name()
            ))
            .into()),
        }
    }

    /// Register the participant from the submitted form.
    ///
    /// In the pre-submission flow this opens the questionnaire; in the
    /// post-submission flow it links the staged answers and finalizes
    /// the submission.
    pub async fn register(&mut self, form: RegistrationForm) -> Result<(), EngineError> {
        self.absorb_conflict()?;
        if self.state.phase != SessionPhase::Registration {
            return Err(CoreError::Conflict(format!(
                "Registration is not open (phase: {})",
                self.state.phase.name()
            ))
            .into());
        }
        let form = form.normalized();
        form.validated()?;

        let request = RegisterRequest {
            name: form.name.clone(),
            email: form.email.clone(),
            phone: form.phone.clone(),
            additional_data: form.additional.clone(),
            is_anonymous: false,
            language: self.state.selected_language.clone(),
        };
        match self
            .gateway
            .register_participant(&self.questionnaire.id, &request)
            .await?
        {
            RegisterOutcome::Registered(data) => {
                let link_tag = self.state.identity.link_tag.take();
                let mut identity = form.into_identity(Some(data.participant_id.clone()));
                identity.link_tag = link_tag;
                self.state.identity = identity;
                self.state.attempt = data.attempt_count.saturating_add(1);
                tracing::info!(participant_id = %data.participant_id, "Participant registered");

                match self.questionnaire.settings.registration_flow {
                    RegistrationFlow::PreSubmission => {
                        self.merge_server_progress().await;
                        self.leave_gate()
                    }
                    RegistrationFlow::PostSubmission => self.finalize_post_registration().await,
                }
            }
            RegisterOutcome::AlreadySubmitted(data) => self.adopt_existing_submission(data),
        }
    }

    // ---- answering ----

    /// Record an answer. Persists the snapshot synchronously and kicks
    /// off a background autosave.
    pub fn set_answer(&mut self, question_id: &str, value: AnswerValue) -> Result<(), EngineError> {
        self.absorb_conflict()?;
        self.require_in_progress()?;
        let question = self.questionnaire.question(question_id).ok_or_else(|| {
            CoreError::NotFound {
                entity: "question",
                id: question_id.to_string(),
            }
        })?;
        if !question.kind.accepts(&value) {
            return Err(CoreError::Validation(format!(
                "A {} question does not accept this answer shape",
                question.kind.label()
            ))
            .into());
        }
        if self.state.submitted_question_ids.contains(question_id) {
            return Err(CoreError::Conflict(format!(
                "Question {question_id} is locked in and cannot change"
            ))
            .into());
        }

        self.state.answers.insert(question_id.to_string(), value);
        self.commit()?;
        self.publish(
            SessionEvent::new(names::ANSWER_COMMITTED)
                .with_payload(json!({ "question_id": question_id })),
        );
        self.spawn_autosave();
        Ok(())
    }

    /// Record or clear a comment on an answered question. Comments live
    /// in the snapshot and ride along with the final submission; they
    /// are not autosaved on their own.
    pub fn set_comment(&mut self, question_id: &str, text: &str) -> Result<(), EngineError> {
        self.absorb_conflict()?;
        self.require_in_progress()?;
        let question = self.questionnaire.question(question_id).ok_or_else(|| {
            CoreError::NotFound {
                entity: "question",
                id: question_id.to_string(),
            }
        })?;
        if !comment_allowed(question, self.state.answers.get(question_id)) {
            return Err(CoreError::Validation(format!(
                "Comments are not available on question {question_id}"
            ))
            .into());
        }
        validate_comment(text)?;

        if text.trim().is_empty() {
            self.state.comments.remove(question_id);
        } else {
            self.state
                .comments
                .insert(question_id.to_string(), text.to_string());
        }
        self.commit()
    }

    // ---- navigation ----

    /// Step forward in the configured display mode. The current scope
    /// (question or section) must be complete first.
    pub fn advance(&mut self) -> Result<NavOutcome, EngineError> {
        self.absorb_conflict()?;
        self.require_in_progress()?;
        let mode = self.questionnaire.settings.display_mode;
        let outcome = {
            let views = filter_sections(&self.questionnaire.sections, &self.state.answers);
            let report = completeness::check(
                self.questionnaire.is_assessment(),
                mode,
                self.state.pointer,
                &views,
                &self.state.answers,
            );
            if let Some(message) = report.message() {
                return Err(EngineError::Blocked(message));
            }
            navigation::advance(mode, self.state.pointer, &views)
        };
        if let NavOutcome::Moved(pointer) = outcome {
            self.state.pointer = pointer;
            self.persist()?;
        }
        Ok(outcome)
    }

    /// Step backward. Never blocked by completeness.
    pub fn retreat(&mut self) -> Result<NavOutcome, EngineError> {
        self.absorb_conflict()?;
        self.require_in_progress()?;
        let mode = self.questionnaire.settings.display_mode;
        let outcome = {
            let views = filter_sections(&self.questionnaire.sections, &self.state.answers);
            navigation::retreat(mode, self.state.pointer, &views)
        };
        if let NavOutcome::Moved(pointer) = outcome {
            self.state.pointer = pointer;
            self.persist()?;
        }
        Ok(outcome)
    }

    // ---- intro video ----

    /// Record intro watch progress. Monotonic; fractions never regress.
    pub fn record_intro_watch(&mut self, fraction: f64) {
        self.state.intro_watched = self.state.intro_watched.max(fraction.clamp(0.0, 1.0));
    }

    /// Leave the intro video gate. Blocked while a mandatory intro has
    /// not been watched far enough.
    pub fn finish_intro(&mut self) -> Result<(), EngineError> {
        self.absorb_conflict()?;
        if self.state.phase != SessionPhase::VideoGate {
            return Err(CoreError::Conflict(format!(
                "No intro video is pending (phase: {})",
                self.state.phase.name()
            ))
            .into());
        }
        if let Some(intro) = &self.questionnaire.settings.video_intro {
            if let Some(message) = video::intro_gate(intro, self.state.intro_watched).message() {
                return Err(EngineError::Blocked(message));
            }
        }
        self.transition(SessionPhase::InProgress)
    }

    /// Report watch progress on a video question. Fire-and-forget.
    pub fn report_video_progress(&self, question_id: &str, watch_secs: u32, completed: bool) {
        let request = VideoProgressRequest {
            activity_id: self.questionnaire.id.clone(),
            question_id: question_id.to_string(),
            participant_id: self.state.identity.participant_id.clone(),
            response_id: self.state.response_id.clone(),
            watch_time_seconds: watch_secs,
            completed_watch: completed,
            total_plays: None,
            total_pauses: None,
            total_seeks: None,
        };
        let gateway = Arc::clone(&self.gateway);
        tokio::spawn(async move {
            if let Err(e) = gateway.record_video_progress(&request).await {
                tracing::warn!(error = %e, "Failed to record video watch progress");
            }
        });
    }

    /// Whether a video question should offer to resume from the stored
    /// watch position. Degrades to starting over on any failure.
    pub async fn video_resume_offer(&self, question_id: &str) -> ResumeOffer {
        let query = VideoProgressQuery {
            question_id: question_id.to_string(),
            activity_id: Some(self.questionnaire.id.clone()),
            participant_id: self.state.identity.participant_id.clone(),
            response_id: self.state.response_id.clone(),
        };
        match self.gateway.fetch_video_progress(&query).await {
            Ok(Some(progress)) => video::resume_offer(f64::from(progress.watch_time_seconds)),
            Ok(None) => ResumeOffer::FromStart,
            Err(e) => {
                tracing::warn!(question_id, error = %e, "Fetching video progress failed");
                ResumeOffer::FromStart
            }
        }
    }

    // ---- submission ----

    /// Submit the session. Validates completeness in the configured
    /// display mode's scope, then either finalizes against the backend
    /// or, in the post-submission flow, stages the answers and routes to
    /// registration. Idempotent once submitted.
    pub async fn submit(&mut self) -> Result<SubmitDisposition, EngineError> {
        self.absorb_conflict()?;
        if self.state.phase.is_submitted() {
            return Ok(SubmitDisposition::Completed {
                outcome: self.state.assessment_result.clone(),
            });
        }
        self.require_in_progress()?;

        {
            let views = filter_sections(&self.questionnaire.sections, &self.state.answers);
            let report = completeness::check(
                self.questionnaire.is_assessment(),
                self.questionnaire.settings.display_mode,
                self.state.pointer,
                &views,
                &self.state.answers,
            );
            if let Some(message) = report.message() {
                return Err(EngineError::Blocked(message));
            }
        }

        if self.state.access_mode == AccessMode::Preview {
            let outcome = self.local_outcome();
            self.state.assessment_result = outcome.clone();
            self.state.submitted = true;
            self.set_phase(SessionPhase::Submitted)?;
            self.publish(
                SessionEvent::new(names::SUBMITTED)
                    .with_payload(json!({ "auto": false, "preview": true })),
            );
            return Ok(SubmitDisposition::Completed { outcome });
        }

        if self.questionnaire.settings.registration_flow == RegistrationFlow::PostSubmission
            && self.state.identity.participant_id.is_none()
        {
            self.stage_answers().await?;
            self.transition(SessionPhase::Registration)?;
            return Ok(SubmitDisposition::RegistrationRequired);
        }

        let outcome = self.send_submission(false).await?;
        Ok(SubmitDisposition::Completed { outcome })
    }

    /// Deadline submission: no completeness check, answers go in as they
    /// stand. The session always lands on a terminal phase, even when
    /// the backend cannot be reached (the snapshot keeps the answers).
    pub async fn force_submit(&mut self) -> Result<(), EngineError> {
        if self.state.phase.is_submitted() {
            return Ok(());
        }
        tracing::info!("Deadline reached; submitting the session as it stands");

        if self.state.access_mode == AccessMode::Preview {
            self.state.assessment_result = self.local_outcome();
            self.state.submitted = true;
            self.set_phase(SessionPhase::AutoSubmitted)?;
            self.publish(
                SessionEvent::new(names::SUBMITTED)
                    .with_payload(json!({ "auto": true, "preview": true })),
            );
            return Ok(());
        }

        if self.questionnaire.settings.registration_flow == RegistrationFlow::PostSubmission
            && self.state.identity.participant_id.is_none()
        {
            // Stage what exists so a late registration can still claim it.
            if let Err(e) = self.stage_answers().await {
                tracing::warn!(error = %e, "Staging on deadline failed; answers stay local");
            }
            self.state.assessment_result = self.local_outcome();
            self.state.submitted = true;
            self.set_phase(SessionPhase::AutoSubmitted)?;
            self.publish(
                SessionEvent::new(names::SUBMITTED)
                    .with_payload(json!({ "auto": true, "already_submitted": false })),
            );
            return Ok(());
        }

        if let Err(e) = self.send_submission(true).await {
            tracing::warn!(error = %e, "Deadline submission failed; answers stay in the snapshot");
            self.state.assessment_result = self.local_outcome();
            self.state.submitted = true;
            self.set_phase(SessionPhase::AutoSubmitted)?;
            self.publish(
                SessionEvent::new(names::SUBMITTED)
                    .with_payload(json!({ "auto": true, "delivered": false })),
            );
        }
        Ok(())
    }

    /// Start the next assessment attempt after a failed submission.
    pub fn start_retake(&mut self) -> Result<(), EngineError> {
        self.absorb_conflict()?;
        if !matches!(
            self.state.phase,
            SessionPhase::Submitted | SessionPhase::AutoSubmitted
        ) {
            return Err(CoreError::Conflict(format!(
                "Retake is only available after a submission (phase: {})",
                self.state.phase.name()
            ))
            .into());
        }
        let can_retake = self
            .state
            .assessment_result
            .as_ref()
            .is_some_and(|r| r.can_retake);
        if !can_retake {
            return Err(
                CoreError::Conflict("No retakes remain for this assessment".to_string()).into(),
            );
        }

        let attempt = self.state.attempt + 1;
        tracing::info!(attempt, "Starting assessment retake");
        self.state.answers.clear();
        self.state.comments.clear();
        self.state.submitted_question_ids.clear();
        self.state.assessment_result = None;
        self.state.submitted = false;
        self.state.pointer = Pointer::default();
        self.state.attempt = attempt;
        self.state.response_id = None;
        self.state.started_at = Utc::now().timestamp_millis();
        self.transition(SessionPhase::InProgress)
    }

    // ---- per-question locking ----

    /// Lock in an assessment answer and return immediate feedback. The
    /// answer can no longer change afterwards.
    pub fn lock_answer(&mut self, question_id: &str) -> Result<AnswerFeedback, EngineError> {
        self.absorb_conflict()?;
        self.require_in_progress()?;
        if !self.questionnaire.is_assessment() {
            return Err(CoreError::Conflict(
                "Only assessments lock answers per question".to_string(),
            )
            .into());
        }
        let question = self.questionnaire.question(question_id).ok_or_else(|| {
            CoreError::NotFound {
                entity: "question",
                id: question_id.to_string(),
            }
        })?;
        let answer = self.state.answers.get(question_id);
        if !answer.is_some_and(|a| !a.is_empty()) {
            return Err(EngineError::Blocked(
                "Please answer the question before locking it in".to_string(),
            ));
        }
        if self.state.submitted_question_ids.contains(question_id) {
            return Err(CoreError::Conflict(format!(
                "Question {question_id} is already locked in"
            ))
            .into());
        }

        let feedback = scoring::answer_feedback(question, answer);
        self.state
            .submitted_question_ids
            .insert(question_id.to_string());
        self.commit()?;
        self.publish(
            SessionEvent::new(names::ANSWER_COMMITTED)
                .with_payload(json!({ "question_id": question_id, "locked": true })),
        );
        self.spawn_autosave();
        Ok(feedback)
    }

    /// Lock in a poll vote and return the distribution to display.
    ///
    /// The vote locks locally whatever the backend says: a reachable
    /// backend answers with the real distribution (or reports the vote
    /// as a duplicate), an unreachable one falls back to a synthesized
    /// distribution when enabled, and to [`PollOutcome::Pending`]
    /// otherwise.
    pub async fn lock_poll_answer(&mut self, question_id: &str) -> Result<PollOutcome, EngineError> {
        self.absorb_conflict()?;
        self.require_in_progress()?;
        if !self.questionnaire.is_poll() {
            return Err(
                CoreError::Conflict("Only polls lock votes per question".to_string()).into(),
            );
        }
        let question = self
            .questionnaire
            .question(question_id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "question",
                id: question_id.to_string(),
            })?
            .clone();
        let answer = match self.state.answers.get(question_id) {
            Some(value) if !value.is_empty() => value.clone(),
            _ => {
                return Err(EngineError::Blocked(
                    "Please pick an option before voting".to_string(),
                ))
            }
        };
        if self.state.submitted_question_ids.contains(question_id) {
            return Err(CoreError::Conflict(format!(
                "Question {question_id} was already voted on"
            ))
            .into());
        }

        let chosen = answer
            .as_text()
            .map(str::to_string)
            .or_else(|| answer.numeric().map(|n| n.to_string()))
            .unwrap_or_default();
        let request = PollAnswerRequest {
            participant_id: self.participant_ref(),
            question_id: question_id.to_string(),
            answer,
        };
        let backend = match self
            .gateway
            .submit_poll_answer(&self.questionnaire.id, &request)
            .await
        {
            Ok(PollAnswerOutcome::Distribution(rows)) => Some(PollOutcome::Distribution(rows)),
            Ok(PollAnswerOutcome::AlreadyAnswered) => {
                tracing::info!(question_id, "Vote was already recorded for this participant");
                Some(PollOutcome::Pending)
            }
            Err(e) => {
                tracing::warn!(question_id, error = %e, "Poll submission failed");
                None
            }
        };
        let (outcome, synthesized) = match backend {
            Some(outcome) => (outcome, false),
            None if self.synthesize_poll_fallback => {
                let rows = poll::synthesize_distribution(&question, &chosen, &mut rand::rng());
                (PollOutcome::Distribution(rows), true)
            }
            None => (PollOutcome::Pending, false),
        };

        self.state
            .submitted_question_ids
            .insert(question_id.to_string());
        self.commit()?;
        self.publish(
            SessionEvent::new(names::POLL_LOCKED)
                .with_payload(json!({ "question_id": question_id, "synthesized": synthesized })),
        );
        Ok(outcome)
    }

    // ---- private: launch ----

    async fn start_fresh(
        &mut self,
        resolution: Resolution,
        findings: &LaunchFindings,
        preset_language: Option<String>,
    ) -> Result<(), EngineError> {
        if let LanguageRequirement::AutoSelect(language) = localization::language_requirement(
            &self.questionnaire.settings.languages,
            preset_language.as_deref(),
        ) {
            self.state.selected_language = Some(language);
        }

        let now = Utc::now().timestamp_millis();
        match resolution {
            Resolution::PreviewStart => {
                self.state.identity = Identity::preview();
                self.transition(SessionPhase::PreviewGate)
            }
            Resolution::Registration { link_tag } => {
                self.state.identity.link_tag = link_tag;
                match self.questionnaire.settings.registration_flow {
                    RegistrationFlow::PreSubmission => {
                        self.transition(SessionPhase::Registration)
                    }
                    // The post flow opens the questionnaire first; the
                    // gate is a plain start screen here.
                    RegistrationFlow::PostSubmission => {
                        self.transition(SessionPhase::AnonymousGate)
                    }
                }
            }
            Resolution::AnonymousStart { link_tag } => {
                let mut identity = Identity::anonymous(now);
                identity.link_tag = link_tag;
                self.state.identity = identity;
                self.transition(SessionPhase::AnonymousGate)
            }
            Resolution::TokenResolved {
                participant,
                auto_advance,
            } => {
                self.state.identity =
                    token_identity(&participant, findings.participant_details.clone(), None);
                self.transition(SessionPhase::TokenGate)?;
                if auto_advance {
                    self.begin().await?;
                }
                Ok(())
            }
            Resolution::AlreadyCompleted { participant } => {
                self.state.identity =
                    token_identity(&participant, findings.participant_details.clone(), None);
                self.state.submitted = true;
                self.transition(SessionPhase::AlreadyCompleted)
            }
        }
    }

    fn snapshot_matches_identity(
        &self,
        snapshot: &SessionSnapshot,
        resolution: &Resolution,
        params: &LaunchParams,
    ) -> bool {
        let stored = snapshot.identity.participant_id.as_deref();
        if let Resolution::TokenResolved { participant, .. } = resolution {
            if stored.is_some_and(|id| id != participant.participant_id) {
                return false;
            }
        }
        if let Some(hint) = params.participant_id.as_deref() {
            if stored.is_some_and(|id| id != hint) {
                return false;
            }
        }
        true
    }

    fn adopt_snapshot(&mut self, snapshot: SessionSnapshot) {
        tracing::info!(
            phase = snapshot.phase.name(),
            answers = snapshot.answers.len(),
            "Resuming session from snapshot"
        );
        self.state = SessionState::from_snapshot(snapshot);
    }

    /// Link and finalize a staged submission on the post-registration
    /// return leg. `false` means fall through to a normal start.
    async fn finalize_staged_return(&mut self, participant_id: &str) -> bool {
        let token = match StagingRepo::load(self.store.as_ref(), &self.questionnaire.id) {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::warn!("Returning submitted launch found no staged submission");
                return false;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read the staging token");
                return false;
            }
        };

        let request = LinkStagedRequest {
            session_token: token,
            participant_id: participant_id.to_string(),
        };
        match self
            .gateway
            .link_staged_submission(&self.questionnaire.id, &request)
            .await
        {
            Ok(answers) => {
                if !answers.is_empty() {
                    self.state.answers = answers;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Linking the staged submission failed; starting over");
                return false;
            }
        }
        self.state.identity.participant_id = Some(participant_id.to_string());

        match self.send_submission(false).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Finalizing the staged submission failed");
                false
            }
        }
    }

    fn publish_resolved(&self, resumed: bool) {
        self.publish(SessionEvent::new(names::RESOLVED).with_payload(json!({
            "access_mode": self.state.access_mode.name(),
            "phase": self.state.phase.name(),
            "resumed": resumed,
        })));
    }

    // ---- private: gates ----

    /// Register the pseudonymous identity of an anonymous session.
    /// Degrades to a local-only session on failure. `false` means the
    /// session became terminal (prior submission found).
    async fn register_anonymous(&mut self) -> Result<bool, EngineError> {
        let request = RegisterRequest {
            name: self.state.identity.name.clone(),
            email: self.state.identity.email.clone(),
            phone: None,
            additional_data: BTreeMap::new(),
            is_anonymous: true,
            language: self.state.selected_language.clone(),
        };
        match self
            .gateway
            .register_participant(&self.questionnaire.id, &request)
            .await
        {
            Ok(RegisterOutcome::Registered(data)) => {
                self.state.identity.participant_id = Some(data.participant_id);
                self.state.attempt = data.attempt_count.saturating_add(1);
                Ok(true)
            }
            Ok(RegisterOutcome::AlreadySubmitted(data)) => {
                self.adopt_existing_submission(data)?;
                Ok(false)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Anonymous registration failed; continuing locally");
                Ok(true)
            }
        }
    }

    /// Adopt server-side progress when the local session has none.
    async fn merge_server_progress(&mut self) {
        let Some(participant_id) = self.state.identity.participant_id.clone() else {
            return;
        };
        let progress = match self
            .gateway
            .load_progress(&self.questionnaire.id, &participant_id)
            .await
        {
            Ok(progress) => progress,
            Err(e) => {
                tracing::warn!(error = %e, "Loading saved progress failed; using local state");
                return;
            }
        };
        let Some(progress) = progress else { return };
        if !self.state.answers.is_empty() || progress.answers.is_empty() {
            return;
        }

        tracing::info!(answers = progress.answers.len(), "Adopting server-side progress");
        self.state.answers = progress.answers;
        self.state.response_id = progress.response_id;
        if let Some(started) = progress.started_at.as_deref().and_then(parse_rfc3339_ms) {
            if started < self.state.started_at {
                self.state.started_at = started;
            }
        }
    }

    fn leave_gate(&mut self) -> Result<(), EngineError> {
        // The clock starts when the questionnaire opens, not at launch.
        if self.state.answers.is_empty() {
            self.state.started_at = Utc::now().timestamp_millis();
        }
        if self.questionnaire.settings.video_intro.is_some() {
            self.transition(SessionPhase::VideoGate)
        } else {
            self.transition(SessionPhase::InProgress)
        }
    }

    /// Finish the post-submission flow right after registration: link
    /// the staged answers, then submit.
    async fn finalize_post_registration(&mut self) -> Result<(), EngineError> {
        let participant_id = self
            .state
            .identity
            .participant_id
            .clone()
            .ok_or_else(|| CoreError::Internal("registration left no participant id".to_string()))?;

        match StagingRepo::load(self.store.as_ref(), &self.questionnaire.id) {
            Ok(Some(token)) => {
                let request = LinkStagedRequest {
                    session_token: token,
                    participant_id,
                };
                match self
                    .gateway
                    .link_staged_submission(&self.questionnaire.id, &request)
                    .await
                {
                    Ok(answers) if !answers.is_empty() => self.state.answers = answers,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "Linking staged answers failed; submitting local answers");
                    }
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Could not read the staging token"),
        }

        self.send_submission(false).await?;
        Ok(())
    }

    /// Adopt a prior submission the backend reported at registration.
    fn adopt_existing_submission(&mut self, data: RegistrationData) -> Result<(), EngineError> {
        tracing::info!(
            participant_id = %data.participant_id,
            can_retake = data.can_retake,
            "Participant already submitted this questionnaire"
        );
        self.state.identity.participant_id = Some(data.participant_id.clone());
        self.state.attempt = data
            .existing_response
            .as_ref()
            .and_then(|r| r.attempt_number)
            .unwrap_or(data.attempt_count)
            .max(1);

        if let Some(existing) = &data.existing_response {
            self.state.response_id = Some(existing.id.clone());
            if let Some(answers) = &existing.answers {
                if !answers.is_empty() {
                    self.state.answers = answers.clone();
                }
            }
        }
        if self.questionnaire.is_assessment() {
            self.state.assessment_result = Some(self.recorded_outcome(&data));
        }

        self.state.submitted = true;
        if data.can_retake {
            // A retake is on offer: land on the submitted screen so the
            // participant can start the next attempt.
            self.set_phase(SessionPhase::Submitted)
        } else {
            self.transition(SessionPhase::AlreadyCompleted)
        }
    }

    /// Rebuild the assessment outcome for a prior submission, rescoring
    /// locally when the stored answers came back with it.
    fn recorded_outcome(&self, data: &RegistrationData) -> AssessmentOutcome {
        let attempt = self.state.attempt;
        let existing = data.existing_response.as_ref();
        if let Some(answers) = existing
            .and_then(|r| r.answers.as_ref())
            .filter(|a| !a.is_empty())
        {
            let mut outcome = scoring::score_assessment(&self.questionnaire, answers, attempt);
            outcome.can_retake = data.can_retake;
            outcome.retakes_remaining = data.retakes_remaining;
            return outcome;
        }

        AssessmentOutcome {
            score: existing.and_then(|r| r.score).unwrap_or(0.0),
            verdict: existing
                .and_then(|r| r.assessment_result.as_deref())
                .and_then(|name| Verdict::from_name(name).ok())
                .unwrap_or(Verdict::Pending),
            correct_count: 0,
            total_scored: 0,
            attempt,
            can_retake: data.can_retake,
            retakes_remaining: data.retakes_remaining,
        }
    }

    // ---- private: submission ----

    /// Build and send the final submission, then land the terminal
    /// phase. Conflict answers (a response already exists) terminate the
    /// session instead of erroring.
    async fn send_submission(
        &mut self,
        auto: bool,
    ) -> Result<Option<AssessmentOutcome>, EngineError> {
        let request = SubmitRequest {
            participant_id: self.participant_ref(),
            answers: self.state.answers.clone(),
            comments: self.state.comments.clone(),
            started_at: DateTime::from_timestamp_millis(self.state.started_at)
                .map(|dt| dt.to_rfc3339()),
            time_expired_at: auto.then(|| Utc::now().to_rfc3339()),
            auto_submitted: auto,
            is_preview: false,
            token: self.launch_token.clone(),
        };
        match self
            .gateway
            .submit_response(&self.questionnaire.id, &request)
            .await?
        {
            SubmitOutcome::Submitted(receipt) => {
                let outcome = self.adopt_receipt(&receipt);
                self.state.submitted = true;
                self.set_phase(if auto {
                    SessionPhase::AutoSubmitted
                } else {
                    SessionPhase::Submitted
                })?;
                self.publish(
                    SessionEvent::new(names::SUBMITTED)
                        .with_payload(json!({ "auto": auto, "already_submitted": false })),
                );
                self.burn_launch_token();
                self.clear_staging();
                Ok(outcome)
            }
            SubmitOutcome::AlreadySubmitted(receipt) => {
                tracing::info!("Backend already holds a submitted response");
                if let Some(receipt) = receipt {
                    if receipt.response_id.is_some() {
                        self.state.response_id = receipt.response_id;
                    }
                    if self.state.assessment_result.is_none() {
                        if let Some(mut outcome) = self.local_outcome() {
                            if let Some(score) = receipt.score {
                                outcome.score = score;
                            }
                            if let Some(verdict) = receipt
                                .assessment_result
                                .as_deref()
                                .and_then(|name| Verdict::from_name(name).ok())
                            {
                                outcome.verdict = verdict;
                            }
                            outcome.can_retake = false;
                            self.state.assessment_result = Some(outcome);
                        }
                    }
                }
                self.state.submitted = true;
                self.set_phase(SessionPhase::AlreadyCompleted)?;
                self.publish(
                    SessionEvent::new(names::SUBMITTED)
                        .with_payload(json!({ "auto": auto, "already_submitted": true })),
                );
                self.clear_staging();
                Ok(self.state.assessment_result.clone())
            }
        }
    }

    /// Fold a submission receipt into local state, preferring backend
    /// numbers and falling back to a local rescore for any it omitted.
    fn adopt_receipt(&mut self, receipt: &SubmissionReceipt) -> Option<AssessmentOutcome> {
        self.state.attempt = receipt.attempt_number.max(1);
        if receipt.response_id.is_some() {
            self.state.response_id = receipt.response_id.clone();
        }
        if !self.questionnaire.is_assessment() {
            return None;
        }

        let local =
            scoring::score_assessment(&self.questionnaire, &self.state.answers, self.state.attempt);
        let outcome = AssessmentOutcome {
            score: receipt.score.unwrap_or(local.score),
            verdict: receipt
                .assessment_result
                .as_deref()
                .and_then(|name| Verdict::from_name(name).ok())
                .unwrap_or(local.verdict),
            correct_count: receipt.correct_answers_count.unwrap_or(local.correct_count),
            total_scored: receipt.total_questions.unwrap_or(local.total_scored),
            attempt: self.state.attempt,
            can_retake: receipt.can_retake,
            retakes_remaining: receipt.retakes_remaining.or(local.retakes_remaining),
        };
        self.state.assessment_result = Some(outcome.clone());
        Some(outcome)
    }

    /// Stage the current answers on the backend ahead of registration.
    async fn stage_answers(&mut self) -> Result<(), EngineError> {
        let request = StageRequest {
            session_token: staging_token(Utc::now().timestamp_millis()),
            answers: self.state.answers.clone(),
            is_preview: false,
            is_anonymous: self.state.identity.is_anonymous,
        };
        let stored = self
            .gateway
            .stage_submission(&self.questionnaire.id, &request)
            .await?;
        StagingRepo::save(self.store.as_ref(), &self.questionnaire.id, &stored)?;
        tracing::info!("Staged answers pending registration");
        Ok(())
    }

    fn local_outcome(&self) -> Option<AssessmentOutcome> {
        self.questionnaire.is_assessment().then(|| {
            scoring::score_assessment(&self.questionnaire, &self.state.answers, self.state.attempt)
        })
    }

    /// The participant reference submissions go out under. Sessions that
    /// never registered get a local guest id, minted once.
    fn participant_ref(&mut self) -> String {
        if let Some(id) = &self.state.identity.participant_id {
            return id.clone();
        }
        let id = guest_participant_id(
            self.state.identity.link_tag.as_deref(),
            Utc::now().timestamp_millis(),
        );
        self.state.identity.participant_id = Some(id.clone());
        id
    }

    fn burn_launch_token(&self) {
        let Some(token) = self.launch_token.clone() else {
            return;
        };
        let Some(role) = self.token_role else { return };
        let gateway = Arc::clone(&self.gateway);
        let participant_id = self.state.identity.participant_id.clone().unwrap_or_default();
        let response_id = self.state.response_id.clone().unwrap_or_default();
        tokio::spawn(async move {
            let result = match role {
                TokenRole::Participant => gateway.mark_token_used(&token).await,
                TokenRole::GeneratedLink => {
                    gateway
                        .mark_link_used(&token, &participant_id, &response_id)
                        .await
                }
            };
            if let Err(e) = result {
                tracing::warn!(error = %e, "Failed to mark the launch token used");
            }
        });
    }

    fn clear_staging(&self) {
        if let Err(e) = StagingRepo::clear(self.store.as_ref(), &self.questionnaire.id) {
            tracing::warn!(error = %e, "Failed to clear the staging token");
        }
    }

    // ---- private: plumbing ----

    fn require_in_progress(&self) -> Result<(), EngineError> {
        if self.state.phase == SessionPhase::InProgress {
            return Ok(());
        }
        let message = if self.state.phase.is_submitted() {
            "The questionnaire has already been submitted".to_string()
        } else {
            format!(
                "Operation requires an in-progress session (phase: {})",
                self.state.phase.name()
            )
        };
        Err(CoreError::Conflict(message).into())
    }

    /// Absorb an already-submitted conflict a background autosave found:
    /// the backend owns the truth, so the session terminates before the
    /// next mutation proceeds.
    fn absorb_conflict(&mut self) -> Result<(), EngineError> {
        if !self.backend_conflict.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        if self.state.phase.is_submitted() {
            return Ok(());
        }
        tracing::info!("Adopting already-submitted state reported by an autosave");
        self.state.submitted = true;
        self.transition(SessionPhase::AlreadyCompleted)
    }

    /// Validated interactive phase transition.
    fn transition(&mut self, to: SessionPhase) -> Result<(), EngineError> {
        let from = self.state.phase;
        state_machine::validate_transition(
            self.questionnaire.settings.registration_flow,
            from,
            to,
        )?;
        self.state.phase = to;
        self.persist()?;
        tracing::debug!(from = from.name(), to = to.name(), "Session phase changed");
        self.publish(
            SessionEvent::new(names::PHASE_CHANGED)
                .with_payload(json!({ "from": from.name(), "to": to.name() })),
        );
        Ok(())
    }

    /// Adopt a phase discovered from backend or stored state. Skips the
    /// interactive transition table: persisted and backend-reported
    /// states were only ever written in legal shapes, and discovery is
    /// not a participant action.
    fn set_phase(&mut self, to: SessionPhase) -> Result<(), EngineError> {
        let from = self.state.phase;
        self.state.phase = to;
        self.persist()?;
        tracing::debug!(from = from.name(), to = to.name(), "Session phase adopted");
        self.publish(
            SessionEvent::new(names::PHASE_CHANGED)
                .with_payload(json!({ "from": from.name(), "to": to.name() })),
        );
        Ok(())
    }

    /// Clamp the pointer against current visibility, then persist.
    fn commit(&mut self) -> Result<(), EngineError> {
        let pointer = {
            let views = filter_sections(&self.questionnaire.sections, &self.state.answers);
            navigation::clamp(self.state.pointer, &views)
        };
        self.state.pointer = pointer;
        self.persist()
    }

    /// Synchronous snapshot write. Previews skip persistence entirely.
    fn persist(&self) -> Result<(), EngineError> {
        if self.state.access_mode == AccessMode::Preview {
            return Ok(());
        }
        let snapshot = self.state.to_snapshot(Utc::now().timestamp_millis());
        SnapshotRepo::save(
            self.store.as_ref(),
            self.scope,
            &self.questionnaire.id,
            &snapshot,
        )?;
        Ok(())
    }

    fn publish(&self, event: SessionEvent) {
        let mut event = event.with_questionnaire(self.questionnaire.id.clone());
        if let Some(id) = &self.state.identity.participant_id {
            event = event.with_participant(id.clone());
        }
        self.bus.publish(event);
    }

    /// Background autosave of the current answers. Failures warn and
    /// publish; a submitted-conflict answer raises the conflict flag for
    /// the next mutating call.
    fn spawn_autosave(&self) {
        if self.state.access_mode == AccessMode::Preview {
            return;
        }
        let Some(participant_id) = self.state.identity.participant_id.clone() else {
            return;
        };
        let gateway = Arc::clone(&self.gateway);
        let bus = Arc::clone(&self.bus);
        let conflict = Arc::clone(&self.backend_conflict);
        let questionnaire_id = self.questionnaire.id.clone();
        let request = SaveProgressRequest {
            participant_id,
            answers: self.state.answers.clone(),
        };
        tokio::spawn(async move {
            match gateway.save_progress(&questionnaire_id, &request).await {
                Ok(SaveOutcome::Saved) => {}
                Ok(SaveOutcome::AlreadySubmitted) => {
                    tracing::warn!(
                        %questionnaire_id,
                        "Autosave found the response already submitted"
                    );
                    conflict.store(true, Ordering::SeqCst);
                }
                Err(e) => {
                    tracing::warn!(%questionnaire_id, error = %e, "Autosave failed");
                    bus.publish(
                        SessionEvent::new(names::AUTOSAVE_FAILED)
                            .with_questionnaire(questionnaire_id)
                            .with_payload(json!({ "error": e.to_string() })),
                    );
                }
            }
        });
    }
}

fn parse_rfc3339_ms(raw: &str) -> Option<EpochMillis> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
