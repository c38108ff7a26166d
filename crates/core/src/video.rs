//! Video watch thresholds and gating decisions.
//!
//! Two thresholds exist on purpose: the intro gate opens slightly early
//! (credits, outros) while an in-questionnaire video question counts as
//! answered only at a stricter fraction, checked by the completeness
//! validator.

use serde::{Deserialize, Serialize};

use crate::questionnaire::VideoIntro;

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Watched fraction at which a mandatory intro video releases its gate.
pub const INTRO_COMPLETE_FRACTION: f64 = 0.90;

/// Watched fraction at which a video question counts as answered.
pub const QUESTION_COMPLETE_FRACTION: f64 = 0.95;

/// Prior watch time below this is ignored; above it the participant is
/// offered a resume-or-restart choice.
pub const RESUME_OFFER_MIN_SECS: f64 = 10.0;

/// How often watch progress is reported to the backend while playing.
pub const PROGRESS_REPORT_INTERVAL_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Decisions
// ---------------------------------------------------------------------------

/// Whether the intro-video gate releases the session into the questions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VideoGateDecision {
    Proceed,
    /// Mandatory video not sufficiently watched. Not an error; blocks
    /// the forward transition with an explanatory message.
    Blocked { watched_fraction: f64 },
}

impl VideoGateDecision {
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Proceed => None,
            Self::Blocked { watched_fraction } => Some(format!(
                "Please watch the introduction video to continue ({:.0}% watched).",
                watched_fraction * 100.0
            )),
        }
    }
}

/// Evaluate the intro gate. Optional intros never block.
pub fn intro_gate(intro: &VideoIntro, watched_fraction: f64) -> VideoGateDecision {
    if intro.mandatory && watched_fraction < INTRO_COMPLETE_FRACTION {
        VideoGateDecision::Blocked { watched_fraction }
    } else {
        VideoGateDecision::Proceed
    }
}

/// What to do with a previously recorded watch position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ResumeOffer {
    /// No meaningful prior progress; play from the beginning.
    FromStart,
    /// Enough prior progress to ask resume-or-restart.
    Resume { position_secs: f64 },
}

/// Decide whether a recorded position warrants a resume offer.
pub fn resume_offer(last_position_secs: f64) -> ResumeOffer {
    if last_position_secs > RESUME_OFFER_MIN_SECS {
        ResumeOffer::Resume {
            position_secs: last_position_secs,
        }
    } else {
        ResumeOffer::FromStart
    }
}
