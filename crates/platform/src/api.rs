//! REST client for the collaborator backend's public endpoints.
//!
//! Wraps the participant-facing HTTP API (token validation, registration,
//! progress, submission, polls, staged submissions, video progress) using
//! [`reqwest`]. Conflict statuses that the session treats as benign
//! (already submitted, already answered) come back as typed outcomes
//! instead of errors.

use fieldwork_core::{AnswerMap, Questionnaire};

use crate::types::{
    ActivityPayload, EncryptedLinkValidation, GeneratedLinkValidation, LinkStagedRequest,
    PollAnswerOutcome, PollAnswerRequest, PollResultsData, RegisterOutcome, RegisterRequest,
    RegistrationData, ResponseEnvelope, SaveOutcome, SaveProgressRequest, SavedProgress,
    StageRequest, StagedSubmissionData, SubmissionReceipt, SubmitOutcome, SubmitRequest,
    TokenValidation, VideoProgress, VideoProgressQuery, VideoProgressRequest,
};

/// HTTP client for one collaborator backend.
pub struct PlatformApi {
    client: reqwest::Client,
    base_url: String,
}

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum PlatformApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status the caller does not treat
    /// as a typed outcome.
    #[error("Backend API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl PlatformApi {
    /// Create a new client.
    ///
    /// * `base_url` - Base HTTP URL, e.g. `https://host/api`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    // -----------------------------------------------------------------------
    // Token validation
    // -----------------------------------------------------------------------

    /// Validate a participant access token.
    ///
    /// Invalid and expired tokens come back as `valid: false`, not as an
    /// error; the resolver degrades them to the registration flow.
    pub async fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<TokenValidation, PlatformApiError> {
        let response = self
            .client
            .get(format!("{}/public/access-tokens/{token}/validate", self.base_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Validate a generated link token (registration or anonymous link).
    pub async fn validate_generated_link(
        &self,
        token: &str,
    ) -> Result<GeneratedLinkValidation, PlatformApiError> {
        let response = self
            .client
            .get(format!("{}/public/generated-link/validate/{token}", self.base_url))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Validate an encrypted link token and learn its access mode.
    pub async fn validate_encrypted_link(
        &self,
        token: &str,
    ) -> Result<EncryptedLinkValidation, PlatformApiError> {
        let body = serde_json::json!({ "token": token });

        let response = self
            .client
            .post(format!("{}/public/activities/validate-link-token", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    // -----------------------------------------------------------------------
    // Questionnaire
    // -----------------------------------------------------------------------

    /// Fetch a questionnaire with its activity-level settings applied.
    pub async fn fetch_questionnaire(
        &self,
        questionnaire_id: &str,
    ) -> Result<Questionnaire, PlatformApiError> {
        let response = self
            .client
            .get(format!("{}/public/activities/{questionnaire_id}", self.base_url))
            .send()
            .await?;

        let envelope: ResponseEnvelope<ActivityPayload> = Self::parse_response(response).await?;
        Ok(envelope.data.into_questionnaire())
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a participant for a questionnaire.
    ///
    /// A 409 means the participant already submitted; its body still
    /// carries the participant id and prior-response details, so it is
    /// reported as [`RegisterOutcome::AlreadySubmitted`] rather than an
    /// error.
    pub async fn register_participant(
        &self,
        questionnaire_id: &str,
        request: &RegisterRequest,
    ) -> Result<RegisterOutcome, PlatformApiError> {
        let response = self
            .client
            .post(format!("{}/public/activities/{questionnaire_id}/register", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 409 {
            let envelope: ResponseEnvelope<RegistrationData> =
                Self::parse_body(response, status.as_u16()).await?;
            return Ok(RegisterOutcome::AlreadySubmitted(envelope.data));
        }

        let envelope: ResponseEnvelope<RegistrationData> = Self::parse_response(response).await?;
        Ok(RegisterOutcome::Registered(envelope.data))
    }

    // -----------------------------------------------------------------------
    // Progress
    // -----------------------------------------------------------------------

    /// Autosave the current answers.
    ///
    /// A 409 means a submitted response already exists and the session
    /// must force its terminal transition.
    pub async fn save_progress(
        &self,
        questionnaire_id: &str,
        request: &SaveProgressRequest,
    ) -> Result<SaveOutcome, PlatformApiError> {
        let response = self
            .client
            .post(format!(
                "{}/public/activities/{questionnaire_id}/save-progress",
                self.base_url
            ))
            .json(request)
            .send()
            .await?;

        if response.status().as_u16() == 409 {
            return Ok(SaveOutcome::AlreadySubmitted);
        }

        Self::check_status(response).await?;
        Ok(SaveOutcome::Saved)
    }

    /// Load server-side progress for a returning participant.
    pub async fn load_progress(
        &self,
        questionnaire_id: &str,
        participant_id: &str,
    ) -> Result<Option<SavedProgress>, PlatformApiError> {
        let response = self
            .client
            .get(format!(
                "{}/public/activities/{questionnaire_id}/load-progress/{participant_id}",
                self.base_url
            ))
            .send()
            .await?;

        let envelope: ResponseEnvelope<Option<SavedProgress>> =
            Self::parse_response(response).await?;
        Ok(envelope.data.filter(|progress| progress.has_progress))
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Submit the final answers.
    ///
    /// 409 and 422 are success-equivalent: the backend already holds a
    /// submitted response, and the session resolves to the same terminal
    /// state either way.
    pub async fn submit_response(
        &self,
        questionnaire_id: &str,
        request: &SubmitRequest,
    ) -> Result<SubmitOutcome, PlatformApiError> {
        let response = self
            .client
            .post(format!("{}/public/activities/{questionnaire_id}/submit", self.base_url))
            .json(request)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 409 || status == 422 {
            let receipt = Self::read_already_submitted(response).await;
            return Ok(SubmitOutcome::AlreadySubmitted(receipt));
        }

        let envelope: ResponseEnvelope<SubmissionReceipt> = Self::parse_response(response).await?;
        Ok(SubmitOutcome::Submitted(envelope.data))
    }

    // -----------------------------------------------------------------------
    // Polls
    // -----------------------------------------------------------------------

    /// Submit a poll answer and receive the running distribution.
    ///
    /// A 400 means this participant already answered the question. Any
    /// transport failure surfaces as an error; the engine then falls back
    /// to a synthesized distribution.
    pub async fn submit_poll_answer(
        &self,
        questionnaire_id: &str,
        request: &PollAnswerRequest,
    ) -> Result<PollAnswerOutcome, PlatformApiError> {
        let response = self
            .client
            .post(format!(
                "{}/public/activities/{questionnaire_id}/poll-answer",
                self.base_url
            ))
            .json(request)
            .send()
            .await?;

        if response.status().as_u16() == 400 {
            return Ok(PollAnswerOutcome::AlreadyAnswered);
        }

        let envelope: ResponseEnvelope<PollResultsData> = Self::parse_response(response).await?;
        Ok(PollAnswerOutcome::Distribution(envelope.data.into_rows()))
    }

    // -----------------------------------------------------------------------
    // Staged submissions
    // -----------------------------------------------------------------------

    /// Stage answers server-side ahead of post-submission registration.
    ///
    /// Returns the session token the staged answers are filed under.
    pub async fn stage_submission(
        &self,
        questionnaire_id: &str,
        request: &StageRequest,
    ) -> Result<String, PlatformApiError> {
        let response = self
            .client
            .post(format!(
                "{}/public/activities/{questionnaire_id}/temporary-submissions",
                self.base_url
            ))
            .json(request)
            .send()
            .await?;

        let envelope: ResponseEnvelope<StagedSubmissionData> =
            Self::parse_response(response).await?;
        Ok(envelope.data.session_token)
    }

    /// Link a staged submission to a freshly registered participant and
    /// recover its answers for the final submit.
    pub async fn link_staged_submission(
        &self,
        questionnaire_id: &str,
        request: &LinkStagedRequest,
    ) -> Result<AnswerMap, PlatformApiError> {
        let response = self
            .client
            .post(format!(
                "{}/public/activities/{questionnaire_id}/temporary-submissions/link",
                self.base_url
            ))
            .json(request)
            .send()
            .await?;

        let envelope: ResponseEnvelope<crate::types::LinkedSubmissionData> =
            Self::parse_response(response).await?;
        Ok(envelope.data.responses)
    }

    // -----------------------------------------------------------------------
    // Post-submission bookkeeping
    // -----------------------------------------------------------------------

    /// Mark a participant access token as used. Fire-and-forget after a
    /// successful submission.
    pub async fn mark_token_used(&self, token: &str) -> Result<(), PlatformApiError> {
        let response = self
            .client
            .post(format!("{}/public/access-tokens/{token}/mark-used", self.base_url))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Mark a generated link as used by a participant and response.
    pub async fn mark_link_used(
        &self,
        token: &str,
        participant_id: &str,
        response_id: &str,
    ) -> Result<(), PlatformApiError> {
        let body = serde_json::json!({
            "token": token,
            "participant_id": participant_id,
            "response_id": response_id,
        });

        let response = self
            .client
            .post(format!("{}/public/generated-link/mark-used", self.base_url))
            .json(&body)
            .send()
            .await?;

        Self::check_status(response).await
    }

    // -----------------------------------------------------------------------
    // Video progress
    // -----------------------------------------------------------------------

    /// Record the current watch position of a video question.
    pub async fn record_video_progress(
        &self,
        request: &VideoProgressRequest,
    ) -> Result<(), PlatformApiError> {
        let response = self
            .client
            .post(format!("{}/public/videos/question/track-progress", self.base_url))
            .json(request)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Fetch the stored watch position backing the resume-or-restart
    /// offer.
    pub async fn fetch_video_progress(
        &self,
        query: &VideoProgressQuery,
    ) -> Result<Option<VideoProgress>, PlatformApiError> {
        let response = self
            .client
            .post(format!("{}/public/videos/question/get-progress", self.base_url))
            .json(query)
            .send()
            .await?;

        #[derive(serde::Deserialize)]
        struct ProgressEnvelope {
            #[serde(default)]
            data: Option<VideoProgress>,
        }

        let envelope: ProgressEnvelope = Self::parse_response(response).await?;
        Ok(envelope.data)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`PlatformApiError::Api`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PlatformApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(PlatformApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PlatformApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Parse the body of a non-2xx response whose payload still carries
    /// data (the 409 conflict bodies).
    async fn parse_body<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        status: u16,
    ) -> Result<T, PlatformApiError> {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        serde_json::from_str(&body).map_err(|_| PlatformApiError::Api { status, body })
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), PlatformApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }

    /// Best-effort parse of the 409 already-submitted body; the receipt
    /// is informative only, so parse failures collapse to `None`.
    async fn read_already_submitted(
        response: reqwest::Response,
    ) -> Option<crate::types::AlreadySubmittedReceipt> {
        let body = response.text().await.ok()?;
        let envelope: ResponseEnvelope<crate::types::AlreadySubmittedReceipt> =
            serde_json::from_str(&body).ok()?;
        Some(envelope.data)
    }
}
