//! Session lifecycle phases and their transition rules.
//!
//! A session starts `Unresolved`, passes through the gate matching its
//! access mode, optionally through the intro-video gate, then answers
//! questions `InProgress` until a submission (explicit or forced by the
//! deadline) lands it in a terminal phase. `AlreadyCompleted` is a side
//! terminal reachable from every pre-submission phase: the backend can
//! report a completed response at any point (409 on register, autosave
//! or submit) and that is never treated as an error.
//!
//! Which edges are legal depends on the questionnaire's registration
//! flow: the standard flow collects participant details before any
//! questions, the post-submission flow collects them after the last
//! answer and immediately before the final submit.

use serde::{Deserialize, Serialize};

use crate::access::AccessMode;
use crate::error::CoreError;
use crate::questionnaire::RegistrationFlow;

/// Lifecycle phase of a participant session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Identity resolution in flight.
    Unresolved,
    /// Collecting participant details.
    Registration,
    /// Anonymous start screen (explicit start click, no details).
    AnonymousGate,
    /// Token resolved; may still need extra fields or a language choice.
    TokenGate,
    /// Preview start screen. No persistence beyond this point.
    PreviewGate,
    /// Mandatory or optional introduction video.
    VideoGate,
    /// Answering questions.
    InProgress,
    /// Submitted by the participant.
    Submitted,
    /// Submitted by the deadline controller.
    AutoSubmitted,
    /// A completed response already exists. Terminal.
    AlreadyCompleted,
}

impl SessionPhase {
    /// Wire/storage name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unresolved => "unresolved",
            Self::Registration => "registration",
            Self::AnonymousGate => "anonymous_gate",
            Self::TokenGate => "token_gate",
            Self::PreviewGate => "preview_gate",
            Self::VideoGate => "video_gate",
            Self::InProgress => "in_progress",
            Self::Submitted => "submitted",
            Self::AutoSubmitted => "auto_submitted",
            Self::AlreadyCompleted => "already_completed",
        }
    }

    /// Parse a storage name back into a phase.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "unresolved" => Ok(Self::Unresolved),
            "registration" => Ok(Self::Registration),
            "anonymous_gate" => Ok(Self::AnonymousGate),
            "token_gate" => Ok(Self::TokenGate),
            "preview_gate" => Ok(Self::PreviewGate),
            "video_gate" => Ok(Self::VideoGate),
            "in_progress" => Ok(Self::InProgress),
            "submitted" => Ok(Self::Submitted),
            "auto_submitted" => Ok(Self::AutoSubmitted),
            "already_completed" => Ok(Self::AlreadyCompleted),
            other => Err(CoreError::Validation(format!(
                "Invalid session phase '{other}'. Must be one of: unresolved, registration, \
                 anonymous_gate, token_gate, preview_gate, video_gate, in_progress, submitted, \
                 auto_submitted, already_completed"
            ))),
        }
    }

    /// The gate phase a freshly resolved session enters for `mode`.
    pub fn gate_for(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Registration => Self::Registration,
            AccessMode::Anonymous => Self::AnonymousGate,
            AccessMode::Token => Self::TokenGate,
            AccessMode::Preview => Self::PreviewGate,
        }
    }

    /// True for phases representing a completed submission.
    pub fn is_submitted(self) -> bool {
        matches!(self, Self::Submitted | Self::AutoSubmitted | Self::AlreadyCompleted)
    }

    /// True once no further phase changes are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::AlreadyCompleted)
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub mod state_machine {
    use super::{CoreError, RegistrationFlow, SessionPhase};
    use SessionPhase::*;

    /// Returns the set of phases reachable from `from` under `flow`.
    ///
    /// `AlreadyCompleted` is terminal and returns an empty slice. The two
    /// submitted phases keep a single edge back to `InProgress` for
    /// assessment retakes.
    pub fn valid_transitions(flow: RegistrationFlow, from: SessionPhase) -> &'static [SessionPhase] {
        match (flow, from) {
            // Resolution lands on a gate, resumes a snapshot mid-session,
            // or short-circuits on a known completed response.
            (_, Unresolved) => &[
                Registration,
                AnonymousGate,
                TokenGate,
                PreviewGate,
                InProgress,
                AlreadyCompleted,
            ],
            (RegistrationFlow::PreSubmission, Registration) => {
                &[VideoGate, InProgress, AlreadyCompleted]
            }
            // Post-submission registration sits between the last answer and
            // the final submit, with a way back to edit answers.
            (RegistrationFlow::PostSubmission, Registration) => {
                &[InProgress, Submitted, AutoSubmitted, AlreadyCompleted]
            }
            (_, AnonymousGate) => &[VideoGate, InProgress, AlreadyCompleted],
            (_, TokenGate) => &[VideoGate, InProgress, AlreadyCompleted],
            (_, PreviewGate) => &[VideoGate, InProgress, AlreadyCompleted],
            (_, VideoGate) => &[InProgress, AlreadyCompleted],
            (RegistrationFlow::PreSubmission, InProgress) => {
                &[Submitted, AutoSubmitted, AlreadyCompleted]
            }
            // In the post flow a normal submit must pass through
            // registration; only the deadline submits directly.
            (RegistrationFlow::PostSubmission, InProgress) => {
                &[Registration, AutoSubmitted, AlreadyCompleted]
            }
            // Retake.
            (_, Submitted) => &[InProgress],
            (_, AutoSubmitted) => &[InProgress],
            (_, AlreadyCompleted) => &[],
        }
    }

    /// Check whether a transition from `from` to `to` is valid under `flow`.
    pub fn can_transition(flow: RegistrationFlow, from: SessionPhase, to: SessionPhase) -> bool {
        valid_transitions(flow, from).contains(&to)
    }

    /// Validate a phase transition, returning a descriptive error for
    /// invalid ones.
    pub fn validate_transition(
        flow: RegistrationFlow,
        from: SessionPhase,
        to: SessionPhase,
    ) -> Result<(), CoreError> {
        if can_transition(flow, from, to) {
            Ok(())
        } else {
            Err(CoreError::Conflict(format!(
                "Invalid phase transition: {} -> {}",
                from.name(),
                to.name()
            )))
        }
    }
}
