//! Questionnaire, section, and settings model.
//!
//! Loaded once from the collaborator backend at session start and treated
//! as read-only for the lifetime of the session.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::navigation::DisplayMode;
use crate::question::Question;
use crate::rules::validate_rule_sources;
use crate::types::QuestionId;

// ---------------------------------------------------------------------------
// Questionnaire kind
// ---------------------------------------------------------------------------

/// Product-level questionnaire category. Assessments force every visible
/// question to be required and enable scoring; polls enable the
/// per-question lock-in flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionnaireKind {
    Survey,
    Assessment,
    Poll,
}

impl QuestionnaireKind {
    /// Wire name, matching the backend's `type` column.
    pub fn name(self) -> &'static str {
        match self {
            Self::Survey => "survey",
            Self::Assessment => "assessment",
            Self::Poll => "poll",
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Ordered group of questions. Well-formed data has at least one
/// question per section, but conditional filtering may empty it at
/// runtime, so nothing here assumes non-emptiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// When registration is collected relative to answering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationFlow {
    /// Identity first, then questions.
    #[default]
    PreSubmission,
    /// Questions first; answers stage server-side until registration.
    PostSubmission,
}

/// Intro video shown before the questionnaire starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoIntro {
    pub url: String,
    /// When set, the session may not enter the questionnaire until the
    /// watch threshold is reached.
    #[serde(default)]
    pub mandatory: bool,
}

/// Questionnaire-level settings. Every field has a backend default, so
/// the whole struct deserializes from `{}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestionnaireSettings {
    /// Fixed for the whole session; not user-toggleable.
    #[serde(default)]
    pub display_mode: DisplayMode,
    /// Session time limit. `None` disables the deadline controller.
    #[serde(default)]
    pub time_limit_minutes: Option<u32>,
    /// Assessment pass threshold (0-100). `None` leaves the verdict
    /// pending.
    #[serde(default)]
    pub pass_percentage: Option<f64>,
    /// Maximum assessment attempts. `None` means unlimited retakes.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Offered languages. More than one requires an explicit choice
    /// before the session starts.
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub video_intro: Option<VideoIntro>,
    #[serde(default)]
    pub registration_flow: RegistrationFlow,
}

// ---------------------------------------------------------------------------
// Questionnaire
// ---------------------------------------------------------------------------

/// A complete questionnaire as served by the collaborator backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Questionnaire {
    pub id: String,
    pub title: String,
    pub kind: QuestionnaireKind,
    pub sections: Vec<Section>,
    #[serde(default)]
    pub settings: QuestionnaireSettings,
}

impl Questionnaire {
    /// All questions across all sections, in document order.
    pub fn all_questions(&self) -> impl Iterator<Item = &Question> {
        self.sections.iter().flat_map(|s| s.questions.iter())
    }

    /// Look up a question by id anywhere in the questionnaire.
    pub fn question(&self, id: &str) -> Option<&Question> {
        self.all_questions().find(|q| q.id == id)
    }

    pub fn is_assessment(&self) -> bool {
        self.kind == QuestionnaireKind::Assessment
    }

    pub fn is_poll(&self) -> bool {
        self.kind == QuestionnaireKind::Poll
    }

    /// Configured time limit in seconds, if any.
    pub fn time_limit_secs(&self) -> Option<u64> {
        self.settings.time_limit_minutes.map(|m| u64::from(m) * 60)
    }

    /// Structural well-formedness: unique question ids and branching
    /// rules that reference known questions. Run once after loading;
    /// sessions never start on malformed data.
    pub fn validate(&self) -> Result<(), CoreError> {
        let ids: Vec<QuestionId> = self.all_questions().map(|q| q.id.clone()).collect();

        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return Err(CoreError::Validation(format!(
                    "Duplicate question id '{id}' in questionnaire '{}'",
                    self.id
                )));
            }
        }

        for question in self.all_questions() {
            if let Some(set) = &question.rules {
                validate_rule_sources(set, &ids)?;
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
