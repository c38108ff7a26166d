//! Pure domain logic for the participant response session engine.
//!
//! Everything in this crate is synchronous and side-effect free: the
//! question/answer model, conditional-visibility evaluation, pointer
//! navigation, completeness validation, assessment scoring, poll
//! distributions, deadline arithmetic, and the session phase state
//! machine. The crates above it add persistence, events, the backend
//! gateway, and the orchestrating engine.
//!
//! Key types:
//!
//! - [`Questionnaire`] / [`Question`] / [`AnswerValue`] — the read-only
//!   document and the participant's answers.
//! - [`visibility::filter_sections`] — (sections, answers) → the
//!   currently visible section views.
//! - [`SessionPhase`] + [`phase::state_machine`] — lifecycle transitions.
//! - [`SessionSnapshot`] — the durable resume state.

pub mod access;
pub mod comments;
pub mod completeness;
pub mod deadline;
pub mod error;
pub mod localization;
pub mod navigation;
pub mod phase;
pub mod poll;
pub mod question;
pub mod questionnaire;
pub mod registration;
pub mod rules;
pub mod scoring;
pub mod snapshot;
pub mod types;
pub mod video;
pub mod visibility;

pub use access::{AccessMode, Identity, LaunchParams, Resolution};
pub use error::CoreError;
pub use navigation::{DisplayMode, Pointer};
pub use phase::SessionPhase;
pub use question::{AnswerMap, AnswerValue, Question, QuestionKind};
pub use questionnaire::{Questionnaire, QuestionnaireKind, Section};
pub use scoring::AssessmentOutcome;
pub use snapshot::{SessionSnapshot, SnapshotScope};
