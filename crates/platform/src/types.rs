//! Wire types for the collaborator backend.
//!
//! Requests serialize to the JSON the public endpoints validate;
//! responses deserialize leniently (`#[serde(default)]` on everything the
//! backend may omit) so older backend versions keep working.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use fieldwork_core::access::ParticipantTokenInfo;
use fieldwork_core::poll::{distribution_from_counts, PollRow};
use fieldwork_core::question::AnswerValue;
use fieldwork_core::types::QuestionId;
use fieldwork_core::{AnswerMap, Questionnaire};

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Standard `{data, message}` envelope every backend response is wrapped
/// in.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub data: T,
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Token validation
// ---------------------------------------------------------------------------

/// Result of validating a participant access token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenValidation {
    pub valid: bool,
    #[serde(default)]
    pub already_completed: bool,
    #[serde(default)]
    pub participant: Option<TokenParticipant>,
}

/// Participant identity carried by a valid access token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenParticipant {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Extra registration fields recorded at invitation time.
    #[serde(default)]
    pub additional_data: BTreeMap<String, serde_json::Value>,
}

impl TokenParticipant {
    /// Reduce to the resolver-facing summary.
    pub fn to_info(&self, already_completed: bool) -> ParticipantTokenInfo {
        ParticipantTokenInfo {
            participant_id: self.id.clone().unwrap_or_default(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            language: self.language.clone(),
            already_completed,
        }
    }
}

/// Result of validating a generated link token.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedLinkValidation {
    pub valid: bool,
    #[serde(default)]
    pub data: Option<GeneratedLinkData>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Payload of a valid generated link.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratedLinkData {
    #[serde(default)]
    pub activity_id: Option<String>,
    pub tag: String,
    /// `registration` or `anonymous`.
    pub link_type: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Result of validating an encrypted link token.
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptedLinkValidation {
    /// `registration`, `preview`, or `anonymous`.
    #[serde(rename = "type", default)]
    pub link_type: Option<String>,
}

// ---------------------------------------------------------------------------
// Questionnaire fetch
// ---------------------------------------------------------------------------

/// Activity payload served by `GET /public/activities/{id}`.
///
/// Assessment and deadline settings live at the activity level on the
/// backend; [`into_questionnaire`](Self::into_questionnaire) folds them
/// into the questionnaire settings the engine consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityPayload {
    pub questionnaire: Questionnaire,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub pass_percentage: Option<f64>,
    /// Retakes allowed after the first attempt.
    #[serde(default)]
    pub max_retakes: Option<u32>,
    #[serde(default)]
    pub time_limit_enabled: bool,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
}

impl ActivityPayload {
    /// Overlay the activity-level settings onto the questionnaire.
    ///
    /// `max_retakes` counts retakes, not attempts; the engine's
    /// `max_attempts` is one higher.
    pub fn into_questionnaire(self) -> Questionnaire {
        let mut questionnaire = self.questionnaire;
        if let Some(pass) = self.pass_percentage {
            questionnaire.settings.pass_percentage = Some(pass);
        }
        if let Some(retakes) = self.max_retakes {
            questionnaire.settings.max_attempts = Some(retakes + 1);
        }
        if self.time_limit_enabled {
            if let Some(minutes) = self.time_limit_minutes {
                questionnaire.settings.time_limit_minutes = Some(minutes);
            }
        } else {
            questionnaire.settings.time_limit_minutes = None;
        }
        questionnaire
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Body of `POST /public/activities/{id}/register`.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_data: BTreeMap<String, String>,
    pub is_anonymous: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Registration result, returned on success and inside the 409
/// already-submitted response alike.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationData {
    pub participant_id: String,
    #[serde(default)]
    pub has_submitted: bool,
    #[serde(default)]
    pub attempt_count: u32,
    #[serde(default)]
    pub can_retake: bool,
    #[serde(default)]
    pub retakes_remaining: Option<u32>,
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    #[serde(default)]
    pub existing_response: Option<ExistingResponse>,
}

/// Prior response attached to a registration outcome.
#[derive(Debug, Clone, Deserialize)]
pub struct ExistingResponse {
    pub id: String,
    #[serde(default)]
    pub answers: Option<AnswerMap>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub assessment_result: Option<String>,
    #[serde(default)]
    pub attempt_number: Option<u32>,
}

/// How registration concluded. A 409 is not an error: the participant
/// exists and has already submitted.
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    Registered(RegistrationData),
    AlreadySubmitted(RegistrationData),
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Body of `POST /public/activities/{id}/save-progress`.
#[derive(Debug, Clone, Serialize)]
pub struct SaveProgressRequest {
    pub participant_id: String,
    pub answers: AnswerMap,
}

/// How an autosave concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// The backend already holds a submitted response; the session must
    /// transition to its terminal state.
    AlreadySubmitted,
}

/// Server-side progress returned by
/// `GET /public/activities/{id}/load-progress/{participant}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SavedProgress {
    #[serde(default)]
    pub has_progress: bool,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub answers: AnswerMap,
    #[serde(default)]
    pub last_saved_at: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

/// Body of `POST /public/activities/{id}/submit`.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitRequest {
    pub participant_id: String,
    pub answers: AnswerMap,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub comments: BTreeMap<QuestionId, String>,
    /// ISO-8601 session start, preserved across saves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// Set when the deadline controller forced this submission.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_expired_at: Option<String>,
    pub auto_submitted: bool,
    pub is_preview: bool,
    /// Generated link token, forwarded so the backend can mark it used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// Receipt for an accepted submission.
#[derive(Debug, Clone, Deserialize)]
pub struct SubmissionReceipt {
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub attempt_number: u32,
    #[serde(default)]
    pub score: Option<f64>,
    /// `pass` or `fail` for assessments, absent otherwise.
    #[serde(default)]
    pub assessment_result: Option<String>,
    #[serde(default)]
    pub correct_answers_count: Option<u32>,
    #[serde(default)]
    pub total_questions: Option<u32>,
    #[serde(default)]
    pub retakes_remaining: Option<u32>,
    #[serde(default)]
    pub can_retake: bool,
}

/// Payload of the 409 already-submitted response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlreadySubmittedReceipt {
    #[serde(default)]
    pub already_submitted: bool,
    #[serde(default)]
    pub response_id: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub assessment_result: Option<String>,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

/// How a final submission concluded. 409/422 resolve to the same
/// terminal state as a success.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Submitted(SubmissionReceipt),
    AlreadySubmitted(Option<AlreadySubmittedReceipt>),
}

// ---------------------------------------------------------------------------
// Polls
// ---------------------------------------------------------------------------

/// Body of `POST /public/activities/{id}/poll-answer`.
#[derive(Debug, Clone, Serialize)]
pub struct PollAnswerRequest {
    pub participant_id: String,
    pub question_id: QuestionId,
    pub answer: AnswerValue,
}

/// Aggregated poll results as the backend reports them.
#[derive(Debug, Clone, Deserialize)]
pub struct PollResultsData {
    pub results: Vec<WirePollRow>,
    #[serde(default)]
    pub total_votes: u32,
    #[serde(default)]
    pub question_id: QuestionId,
}

/// One aggregated row; the backend rounds percentages to one decimal.
#[derive(Debug, Clone, Deserialize)]
pub struct WirePollRow {
    pub option: String,
    pub count: u32,
    #[serde(default)]
    pub percentage: f64,
}

impl PollResultsData {
    /// Rebuild display rows from the counts so percentages always sum
    /// to exactly 100.
    pub fn into_rows(self) -> Vec<PollRow> {
        distribution_from_counts(
            self.results
                .into_iter()
                .map(|row| (row.option, row.count))
                .collect(),
        )
    }
}

/// How a poll answer concluded.
#[derive(Debug, Clone)]
pub enum PollAnswerOutcome {
    Distribution(Vec<PollRow>),
    /// This participant already answered the question; the vote did not
    /// change.
    AlreadyAnswered,
}

// ---------------------------------------------------------------------------
// Staged submissions
// ---------------------------------------------------------------------------

/// Body of `POST /public/activities/{id}/temporary-submissions`.
#[derive(Debug, Clone, Serialize)]
pub struct StageRequest {
    pub session_token: String,
    pub answers: AnswerMap,
    pub is_preview: bool,
    pub is_anonymous: bool,
}

/// Response payload of a staged submission.
#[derive(Debug, Clone, Deserialize)]
pub struct StagedSubmissionData {
    pub session_token: String,
}

/// Body of `POST /public/activities/{id}/temporary-submissions/link`.
#[derive(Debug, Clone, Serialize)]
pub struct LinkStagedRequest {
    pub session_token: String,
    pub participant_id: String,
}

/// Answers recovered when a staged submission is linked.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedSubmissionData {
    #[serde(default)]
    pub responses: AnswerMap,
}

// ---------------------------------------------------------------------------
// Video progress
// ---------------------------------------------------------------------------

/// Body of `POST /public/videos/question/track-progress`.
#[derive(Debug, Clone, Serialize)]
pub struct VideoProgressRequest {
    pub activity_id: String,
    pub question_id: QuestionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
    pub watch_time_seconds: u32,
    pub completed_watch: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_plays: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_pauses: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_seeks: Option<u32>,
}

/// Body of `POST /public/videos/question/get-progress`.
#[derive(Debug, Clone, Serialize)]
pub struct VideoProgressQuery {
    pub question_id: QuestionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_id: Option<String>,
}

/// Stored watch position for one video question.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoProgress {
    #[serde(default)]
    pub watch_time_seconds: u32,
    #[serde(default)]
    pub completed_watch: bool,
    #[serde(default)]
    pub total_plays: Option<u32>,
    #[serde(default)]
    pub total_pauses: Option<u32>,
    #[serde(default)]
    pub total_seeks: Option<u32>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
