//! Required-answer validation, scoped to the display mode.
//!
//! Runs before any participant-initiated submit or forward move:
//! single mode checks only the pointer's current question, section mode
//! the current section's visible questions, all mode every visible
//! question. Forced submits from the deadline controller skip this
//! module entirely. The report lists every missing question but renders
//! a single actionable message.

use crate::navigation::{self, DisplayMode, Pointer};
use crate::question::{AnswerMap, AnswerValue, Question, QuestionKind};
use crate::video::QUESTION_COMPLETE_FRACTION;
use crate::visibility::SectionView;

/// A question requires an answer iff the questionnaire is an assessment
/// (always, overriding the per-question flag) or the question's required
/// flag is not explicitly false.
pub fn requires_answer(is_assessment: bool, question: &Question) -> bool {
    is_assessment || question.required != Some(false)
}

/// Answered means present, and neither an empty string nor an empty
/// list. Video questions additionally demand a completed watch at the
/// question threshold.
pub fn is_answered(question: &Question, answer: Option<&AnswerValue>) -> bool {
    let Some(value) = answer else {
        return false;
    };
    match (&question.kind, value) {
        (
            QuestionKind::Video { .. },
            AnswerValue::VideoWatch {
                completed,
                watched_fraction,
            },
        ) => *completed && *watched_fraction >= QUESTION_COMPLETE_FRACTION,
        (QuestionKind::Video { .. }, _) => false,
        (_, value) => !value.is_empty(),
    }
}

/// Result of a completeness check over one validation scope.
#[derive(Debug, Clone)]
pub struct CompletenessReport<'a> {
    /// Questions in scope that require an answer and have none, in
    /// document order.
    pub missing: Vec<&'a Question>,
}

impl<'a> CompletenessReport<'a> {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// The one message surfaced to the participant, `None` when complete.
    pub fn message(&self) -> Option<String> {
        match self.missing.as_slice() {
            [] => None,
            [one] => Some(format!("Please answer '{}' before continuing.", one.title)),
            many => Some(format!(
                "Please answer all required questions before continuing ({} remaining).",
                many.len()
            )),
        }
    }
}

/// Validate the scope selected by `mode` around `pointer`.
pub fn check<'a>(
    is_assessment: bool,
    mode: DisplayMode,
    pointer: Pointer,
    views: &[SectionView<'a>],
    answers: &AnswerMap,
) -> CompletenessReport<'a> {
    let pointer = navigation::clamp(pointer, views);
    let in_scope: Vec<&'a Question> = match mode {
        DisplayMode::Single => views
            .get(pointer.section)
            .and_then(|view| view.questions.get(pointer.question))
            .map(|q| vec![*q])
            .unwrap_or_default(),
        DisplayMode::Section => views
            .get(pointer.section)
            .map(|view| view.questions.clone())
            .unwrap_or_default(),
        DisplayMode::All => views
            .iter()
            .flat_map(|view| view.questions.iter().copied())
            .collect(),
    };

    let missing = in_scope
        .into_iter()
        .filter(|q| requires_answer(is_assessment, q) && !is_answered(q, answers.get(&q.id)))
        .collect();
    CompletenessReport { missing }
}
