//! Backend abstraction consumed by the session engine.
//!
//! [`ResponseGateway`] is the seam between the engine and the REST
//! client: the engine only ever talks to the trait, so tests substitute
//! an in-process stub and the engine's conflict handling, fallbacks and
//! fire-and-forget paths get exercised without a network.

use async_trait::async_trait;
use fieldwork_core::{AnswerMap, Questionnaire};

use crate::api::{PlatformApi, PlatformApiError};
use crate::types::{
    EncryptedLinkValidation, GeneratedLinkValidation, LinkStagedRequest, PollAnswerOutcome,
    PollAnswerRequest, RegisterOutcome, RegisterRequest, SaveOutcome, SaveProgressRequest,
    SavedProgress, StageRequest, SubmitOutcome, SubmitRequest, TokenValidation, VideoProgress,
    VideoProgressQuery, VideoProgressRequest,
};

/// Participant-facing backend operations the session engine depends on.
#[async_trait]
pub trait ResponseGateway: Send + Sync {
    /// Validate a participant access token.
    async fn validate_access_token(&self, token: &str)
        -> Result<TokenValidation, PlatformApiError>;

    /// Validate a generated link token.
    async fn validate_generated_link(
        &self,
        token: &str,
    ) -> Result<GeneratedLinkValidation, PlatformApiError>;

    /// Validate an encrypted link token.
    async fn validate_encrypted_link(
        &self,
        token: &str,
    ) -> Result<EncryptedLinkValidation, PlatformApiError>;

    /// Fetch the questionnaire definition with activity settings folded in.
    async fn fetch_questionnaire(
        &self,
        questionnaire_id: &str,
    ) -> Result<Questionnaire, PlatformApiError>;

    /// Register a participant, surfacing prior submissions as a typed
    /// outcome.
    async fn register_participant(
        &self,
        questionnaire_id: &str,
        request: &RegisterRequest,
    ) -> Result<RegisterOutcome, PlatformApiError>;

    /// Autosave in-progress answers.
    async fn save_progress(
        &self,
        questionnaire_id: &str,
        request: &SaveProgressRequest,
    ) -> Result<SaveOutcome, PlatformApiError>;

    /// Load server-side progress for a returning participant.
    async fn load_progress(
        &self,
        questionnaire_id: &str,
        participant_id: &str,
    ) -> Result<Option<SavedProgress>, PlatformApiError>;

    /// Submit the final answers.
    async fn submit_response(
        &self,
        questionnaire_id: &str,
        request: &SubmitRequest,
    ) -> Result<SubmitOutcome, PlatformApiError>;

    /// Submit a poll answer and fetch the running distribution.
    async fn submit_poll_answer(
        &self,
        questionnaire_id: &str,
        request: &PollAnswerRequest,
    ) -> Result<PollAnswerOutcome, PlatformApiError>;

    /// Stage answers ahead of post-submission registration.
    async fn stage_submission(
        &self,
        questionnaire_id: &str,
        request: &StageRequest,
    ) -> Result<String, PlatformApiError>;

    /// Link staged answers to a registered participant.
    async fn link_staged_submission(
        &self,
        questionnaire_id: &str,
        request: &LinkStagedRequest,
    ) -> Result<AnswerMap, PlatformApiError>;

    /// Mark an access token as consumed.
    async fn mark_token_used(&self, token: &str) -> Result<(), PlatformApiError>;

    /// Mark a generated link as consumed.
    async fn mark_link_used(
        &self,
        token: &str,
        participant_id: &str,
        response_id: &str,
    ) -> Result<(), PlatformApiError>;

    /// Record video watch progress.
    async fn record_video_progress(
        &self,
        request: &VideoProgressRequest,
    ) -> Result<(), PlatformApiError>;

    /// Fetch stored video watch progress.
    async fn fetch_video_progress(
        &self,
        query: &VideoProgressQuery,
    ) -> Result<Option<VideoProgress>, PlatformApiError>;
}

#[async_trait]
impl ResponseGateway for PlatformApi {
    async fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<TokenValidation, PlatformApiError> {
        PlatformApi::validate_access_token(self, token).await
    }

    async fn validate_generated_link(
        &self,
        token: &str,
    ) -> Result<GeneratedLinkValidation, PlatformApiError> {
        PlatformApi::validate_generated_link(self, token).await
    }

    async fn validate_encrypted_link(
        &self,
        token: &str,
    ) -> Result<EncryptedLinkValidation, PlatformApiError> {
        PlatformApi::validate_encrypted_link(self, token).await
    }

    async fn fetch_questionnaire(
        &self,
        questionnaire_id: &str,
    ) -> Result<Questionnaire, PlatformApiError> {
        PlatformApi::fetch_questionnaire(self, questionnaire_id).await
    }

    async fn register_participant(
        &self,
        questionnaire_id: &str,
        request: &RegisterRequest,
    ) -> Result<RegisterOutcome, PlatformApiError> {
        PlatformApi::register_participant(self, questionnaire_id, request).await
    }

    async fn save_progress(
        &self,
        questionnaire_id: &str,
        request: &SaveProgressRequest,
    ) -> Result<SaveOutcome, PlatformApiError> {
        PlatformApi::save_progress(self, questionnaire_id, request).await
    }

    async fn load_progress(
        &self,
        questionnaire_id: &str,
        participant_id: &str,
    ) -> Result<Option<SavedProgress>, PlatformApiError> {
        PlatformApi::load_progress(self, questionnaire_id, participant_id).await
    }

    async fn submit_response(
        &self,
        questionnaire_id: &str,
        request: &SubmitRequest,
    ) -> Result<SubmitOutcome, PlatformApiError> {
        PlatformApi::submit_response(self, questionnaire_id, request).await
    }

    async fn submit_poll_answer(
        &self,
        questionnaire_id: &str,
        request: &PollAnswerRequest,
    ) -> Result<PollAnswerOutcome, PlatformApiError> {
        PlatformApi::submit_poll_answer(self, questionnaire_id, request).await
    }

    async fn stage_submission(
        &self,
        questionnaire_id: &str,
        request: &StageRequest,
    ) -> Result<String, PlatformApiError> {
        PlatformApi::stage_submission(self, questionnaire_id, request).await
    }

    async fn link_staged_submission(
        &self,
        questionnaire_id: &str,
        request: &LinkStagedRequest,
    ) -> Result<AnswerMap, PlatformApiError> {
        PlatformApi::link_staged_submission(self, questionnaire_id, request).await
    }

    async fn mark_token_used(&self, token: &str) -> Result<(), PlatformApiError> {
        PlatformApi::mark_token_used(self, token).await
    }

    async fn mark_link_used(
        &self,
        token: &str,
        participant_id: &str,
        response_id: &str,
    ) -> Result<(), PlatformApiError> {
        PlatformApi::mark_link_used(self, token, participant_id, response_id).await
    }

    async fn record_video_progress(
        &self,
        request: &VideoProgressRequest,
    ) -> Result<(), PlatformApiError> {
        PlatformApi::record_video_progress(self, request).await
    }

    async fn fetch_video_progress(
        &self,
        query: &VideoProgressQuery,
    ) -> Result<Option<VideoProgress>, PlatformApiError> {
        PlatformApi::fetch_video_progress(self, query).await
    }
}
