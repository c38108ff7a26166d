//! Session orchestration for participant questionnaire runs.
//!
//! This crate glues the pure domain logic in `fieldwork-core` to the
//! effectful world: the backend gateway, the scoped snapshot store, and
//! the event bus. Key items:
//!
//! - [`SessionEngine`] — owns one session from launch to terminal phase:
//!   identity resolution, restore, gates, answering, navigation,
//!   submission, retakes, polls.
//! - [`DeadlineController`] — the countdown for timed questionnaires;
//!   drivers await its expiry and force-submit.
//! - [`EngineConfig`] — environment-derived settings.

pub mod config;
pub mod deadline;
pub mod engine;
pub mod identity;

pub use config::EngineConfig;
pub use deadline::DeadlineController;
pub use engine::{EngineError, SessionEngine, SessionState, SubmitDisposition};
