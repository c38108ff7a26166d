//! Per-question comment policy.

use crate::error::CoreError;
use crate::question::{AnswerValue, Question};

/// Maximum comment length in characters.
pub const MAX_COMMENT_LEN: usize = 1000;

/// A comment box is offered only when the question enables it, the kind
/// supports it, and the question already has a non-empty answer.
pub fn comment_allowed(question: &Question, answer: Option<&AnswerValue>) -> bool {
    question.comment_enabled
        && question.kind.supports_comments()
        && answer.is_some_and(|a| !a.is_empty())
}

/// Length check for a comment about to be committed.
pub fn validate_comment(text: &str) -> Result<(), CoreError> {
    let len = text.chars().count();
    if len > MAX_COMMENT_LEN {
        return Err(CoreError::Validation(format!(
            "Comment is too long ({len} characters). Maximum is {MAX_COMMENT_LEN}."
        )));
    }
    Ok(())
}
