//! Domain error type shared by every module in this crate.

/// Domain-level error for the response session engine.
///
/// Higher layers (store, platform client, session orchestrator) wrap this
/// in their own error enums; `core` itself never logs or swallows.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Input failed a domain rule; the message is participant-safe.
    #[error("{0}")]
    Validation(String),

    /// A referenced entity does not exist.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The operation conflicts with current state (e.g. an invalid
    /// session phase transition).
    #[error("{0}")]
    Conflict(String),

    /// An invariant was broken; not participant-facing.
    #[error("internal error: {0}")]
    Internal(String),
}
