//! Index-based assessment scoring and retake eligibility.
//!
//! Scoring never compares option labels against stored answers directly:
//! the selected labels are mapped back to their index positions in the
//! question's option list and compared against the configured correct
//! index set. Single-choice is a membership test of one index,
//! multi-choice requires exact set equality. A question whose answer is
//! absent, or selects a label not present in the option list, counts as
//! incorrect.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::question::{AnswerMap, AnswerValue, Question, QuestionKind};
use crate::questionnaire::Questionnaire;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Pass/fail verdict. `Pending` when the questionnaire configures no
/// pass percentage, so the backend (or a human) decides later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    Pending,
}

impl Verdict {
    pub fn name(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Pending => "pending",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "pending" => Ok(Self::Pending),
            other => Err(CoreError::Validation(format!(
                "Invalid assessment verdict '{other}'. Must be one of: pass, fail, pending"
            ))),
        }
    }
}

/// Outcome of one assessment submission. Created once at submission
/// time and never mutated within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentOutcome {
    /// 0–100, fractional. Use [`AssessmentOutcome::display_score`] for UI.
    pub score: f64,
    pub verdict: Verdict,
    pub correct_count: u32,
    pub total_scored: u32,
    /// 1-based attempt number this outcome belongs to.
    pub attempt: u32,
    pub can_retake: bool,
    /// `None` = unlimited attempts configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retakes_remaining: Option<u32>,
}

impl AssessmentOutcome {
    /// Score rounded for display.
    pub fn display_score(&self) -> u32 {
        self.score.round() as u32
    }
}

/// Feedback for a single locked-in assessment answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFeedback {
    Correct,
    Incorrect,
    /// The question carries no correct-answer set.
    Unscored,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Score a full assessment over the current answer map.
///
/// Every question with a configured correct-answer set is scored,
/// whether or not it is currently visible or answered. `attempt` is the
/// 1-based attempt number being submitted.
pub fn score_assessment(
    questionnaire: &Questionnaire,
    answers: &AnswerMap,
    attempt: u32,
) -> AssessmentOutcome {
    let scored: Vec<&Question> = questionnaire
        .all_questions()
        .filter(|q| q.kind.correct_indices().is_some())
        .collect();

    let correct_count = scored
        .iter()
        .filter(|q| question_correct(q, answers.get(&q.id)) == Some(true))
        .count() as u32;
    let total_scored = scored.len() as u32;

    let score = if total_scored == 0 {
        0.0
    } else {
        f64::from(correct_count) / f64::from(total_scored) * 100.0
    };

    let verdict = match questionnaire.settings.pass_percentage {
        _ if total_scored == 0 => Verdict::Pending,
        Some(pass) => {
            if score >= pass {
                Verdict::Pass
            } else {
                Verdict::Fail
            }
        }
        None => Verdict::Pending,
    };

    let max_attempts = questionnaire.settings.max_attempts;
    let can_retake =
        verdict == Verdict::Fail && max_attempts.map_or(true, |max| attempt < max);
    let retakes_remaining = max_attempts.map(|max| max.saturating_sub(attempt));

    AssessmentOutcome {
        score,
        verdict,
        correct_count,
        total_scored,
        attempt,
        can_retake,
        retakes_remaining,
    }
}

/// Check one question's answer against its correct index set.
///
/// `None` when the question carries no correct set (not scoreable).
pub fn question_correct(question: &Question, answer: Option<&AnswerValue>) -> Option<bool> {
    let correct = question.kind.correct_indices()?;
    let correct: BTreeSet<usize> = correct.iter().copied().collect();

    let options = match question.kind.options() {
        Some(options) => options,
        None => return Some(false),
    };
    let selected = match answer.and_then(|a| selected_indices(options, a)) {
        Some(selected) => selected,
        None => return Some(false),
    };

    let result = match &question.kind {
        QuestionKind::MultiChoice { .. } => selected == correct,
        _ => selected.len() == 1 && selected.iter().all(|i| correct.contains(i)),
    };
    Some(result)
}

/// Feedback variant for the submit-one-question assessment flow.
pub fn answer_feedback(question: &Question, answer: Option<&AnswerValue>) -> AnswerFeedback {
    match question_correct(question, answer) {
        Some(true) => AnswerFeedback::Correct,
        Some(false) => AnswerFeedback::Incorrect,
        None => AnswerFeedback::Unscored,
    }
}

/// Map the selected option labels back to index positions. `None` when
/// the answer holds no selectable labels at all.
fn selected_indices(options: &[String], answer: &AnswerValue) -> Option<BTreeSet<usize>> {
    let labels: Vec<&str> = match answer {
        AnswerValue::Text(text) => vec![text.as_str()],
        AnswerValue::Choices(choices) => choices.iter().map(String::as_str).collect(),
        AnswerValue::Detailed { value, .. } => vec![value.as_str()],
        AnswerValue::Number(_) | AnswerValue::VideoWatch { .. } => return None,
    };
    if labels.is_empty() {
        return None;
    }
    // An unknown label maps to no index, making the selection unequal to
    // any correct set.
    Some(
        labels
            .iter()
            .filter_map(|label| options.iter().position(|o| o == label))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::{QuestionnaireKind, Section};

    fn single_choice(id: &str, correct: Vec<usize>) -> Question {
        Question {
            id: id.to_string(),
            title: id.to_string(),
            kind: QuestionKind::SingleChoice {
                options: vec!["A".to_string(), "B".to_string(), "C".to_string()],
                correct,
                other_option: false,
            },
            required: None,
            comment_enabled: false,
            rules: None,
            order: 0,
        }
    }

    fn multi_choice(id: &str, correct: Vec<usize>) -> Question {
        Question {
            id: id.to_string(),
            title: id.to_string(),
            kind: QuestionKind::MultiChoice {
                options: vec!["A".to_string(), "B".to_string(), "C".to_string(), "D".to_string()],
                correct,
                max_selections: None,
            },
            required: None,
            comment_enabled: false,
            rules: None,
            order: 0,
        }
    }

    fn assessment(questions: Vec<Question>) -> Questionnaire {
        let mut q = Questionnaire {
            id: "a-1".to_string(),
            title: "Quiz".to_string(),
            kind: QuestionnaireKind::Assessment,
            sections: vec![Section {
                id: "s1".to_string(),
                title: "s1".to_string(),
                questions,
            }],
            settings: Default::default(),
        };
        q.settings.pass_percentage = Some(70.0);
        q
    }

    fn answered(pairs: &[(&str, AnswerValue)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(id, v)| (id.to_string(), v.clone()))
            .collect()
    }

    // -- single-choice membership --

    #[test]
    fn single_choice_correct_by_index() {
        let q = single_choice("q1", vec![1]);
        let b = AnswerValue::Text("B".to_string());
        assert_eq!(question_correct(&q, Some(&b)), Some(true));
    }

    #[test]
    fn single_choice_incorrect_options() {
        let q = single_choice("q1", vec![1]);
        for wrong in ["A", "C"] {
            let answer = AnswerValue::Text(wrong.to_string());
            assert_eq!(question_correct(&q, Some(&answer)), Some(false));
        }
    }

    #[test]
    fn unknown_label_is_incorrect() {
        let q = single_choice("q1", vec![1]);
        let answer = AnswerValue::Text("Z".to_string());
        assert_eq!(question_correct(&q, Some(&answer)), Some(false));
    }

    #[test]
    fn absent_answer_is_incorrect() {
        let q = single_choice("q1", vec![1]);
        assert_eq!(question_correct(&q, None), Some(false));
    }

    #[test]
    fn detailed_answer_value_is_scored() {
        let q = single_choice("q1", vec![2]);
        let answer = AnswerValue::Detailed {
            value: "C".to_string(),
            other_text: None,
        };
        assert_eq!(question_correct(&q, Some(&answer)), Some(true));
    }

    #[test]
    fn unscoreable_question_returns_none() {
        let q = single_choice("q1", vec![]);
        let answer = AnswerValue::Text("A".to_string());
        assert_eq!(question_correct(&q, Some(&answer)), None);
        assert_eq!(answer_feedback(&q, Some(&answer)), AnswerFeedback::Unscored);
    }

    // -- multi-choice exact set equality --

    #[test]
    fn multi_choice_exact_set_is_correct() {
        let q = multi_choice("q1", vec![0, 2]);
        let answer = AnswerValue::Choices(vec!["C".to_string(), "A".to_string()]);
        assert_eq!(question_correct(&q, Some(&answer)), Some(true));
    }

    #[test]
    fn multi_choice_missing_selection_fails() {
        let q = multi_choice("q1", vec![0, 2]);
        let answer = AnswerValue::Choices(vec!["A".to_string()]);
        assert_eq!(question_correct(&q, Some(&answer)), Some(false));
    }

    #[test]
    fn multi_choice_extra_selection_fails() {
        let q = multi_choice("q1", vec![0, 2]);
        let answer =
            AnswerValue::Choices(vec!["A".to_string(), "C".to_string(), "D".to_string()]);
        assert_eq!(question_correct(&q, Some(&answer)), Some(false));
    }

    // -- full assessment scoring --

    fn ten_question_run(correct_answers: usize) -> AssessmentOutcome {
        let questions: Vec<Question> =
            (0..10).map(|i| single_choice(&format!("q{i}"), vec![1])).collect();
        let quiz = assessment(questions);
        let answers: AnswerMap = (0..10)
            .map(|i| {
                let label = if i < correct_answers { "B" } else { "A" };
                (format!("q{i}"), AnswerValue::Text(label.to_string()))
            })
            .collect();
        score_assessment(&quiz, &answers, 1)
    }

    #[test]
    fn eight_of_ten_passes_at_seventy() {
        let outcome = ten_question_run(8);
        assert_eq!(outcome.score, 80.0);
        assert_eq!(outcome.verdict, Verdict::Pass);
        assert_eq!(outcome.correct_count, 8);
        assert_eq!(outcome.total_scored, 10);
        assert!(!outcome.can_retake);
    }

    #[test]
    fn five_of_ten_fails_with_retakes_remaining() {
        let questions: Vec<Question> =
            (0..10).map(|i| single_choice(&format!("q{i}"), vec![1])).collect();
        let mut quiz = assessment(questions);
        quiz.settings.max_attempts = Some(3);
        let answers: AnswerMap = (0..10)
            .map(|i| {
                let label = if i < 5 { "B" } else { "A" };
                (format!("q{i}"), AnswerValue::Text(label.to_string()))
            })
            .collect();
        let outcome = score_assessment(&quiz, &answers, 1);
        assert_eq!(outcome.score, 50.0);
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.can_retake);
        assert_eq!(outcome.retakes_remaining, Some(2));
    }

    #[test]
    fn score_keeps_fractional_precision() {
        let questions = vec![
            single_choice("q0", vec![1]),
            single_choice("q1", vec![1]),
            single_choice("q2", vec![1]),
        ];
        let quiz = assessment(questions);
        let answers = answered(&[("q0", AnswerValue::Text("B".to_string()))]);
        let outcome = score_assessment(&quiz, &answers, 1);
        assert!((outcome.score - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(outcome.display_score(), 33);
    }

    #[test]
    fn last_attempt_failure_cannot_retake() {
        let questions = vec![single_choice("q0", vec![1])];
        let mut quiz = assessment(questions);
        quiz.settings.max_attempts = Some(2);
        let outcome = score_assessment(&quiz, &AnswerMap::new(), 2);
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(!outcome.can_retake);
        assert_eq!(outcome.retakes_remaining, Some(0));
    }

    #[test]
    fn unlimited_attempts_always_allow_retake_on_failure() {
        let questions = vec![single_choice("q0", vec![1])];
        let quiz = assessment(questions);
        let outcome = score_assessment(&quiz, &AnswerMap::new(), 7);
        assert_eq!(outcome.verdict, Verdict::Fail);
        assert!(outcome.can_retake);
        assert_eq!(outcome.retakes_remaining, None);
    }

    #[test]
    fn no_pass_percentage_is_pending() {
        let questions = vec![single_choice("q0", vec![1])];
        let mut quiz = assessment(questions);
        quiz.settings.pass_percentage = None;
        let answers = answered(&[("q0", AnswerValue::Text("B".to_string()))]);
        let outcome = score_assessment(&quiz, &answers, 1);
        assert_eq!(outcome.verdict, Verdict::Pending);
        assert!(!outcome.can_retake);
    }

    #[test]
    fn nothing_scoreable_is_pending() {
        let questions = vec![single_choice("q0", vec![])];
        let quiz = assessment(questions);
        let outcome = score_assessment(&quiz, &AnswerMap::new(), 1);
        assert_eq!(outcome.verdict, Verdict::Pending);
        assert_eq!(outcome.total_scored, 0);
        assert_eq!(outcome.score, 0.0);
    }

    #[test]
    fn unscored_questions_do_not_dilute_the_score() {
        let questions = vec![
            single_choice("q0", vec![1]),
            single_choice("open", vec![]),
        ];
        let quiz = assessment(questions);
        let answers = answered(&[("q0", AnswerValue::Text("B".to_string()))]);
        let outcome = score_assessment(&quiz, &answers, 1);
        assert_eq!(outcome.total_scored, 1);
        assert_eq!(outcome.score, 100.0);
    }

    #[test]
    fn feedback_variants() {
        let q = single_choice("q1", vec![1]);
        let right = AnswerValue::Text("B".to_string());
        let wrong = AnswerValue::Text("A".to_string());
        assert_eq!(answer_feedback(&q, Some(&right)), AnswerFeedback::Correct);
        assert_eq!(answer_feedback(&q, Some(&wrong)), AnswerFeedback::Incorrect);
    }

    #[test]
    fn verdict_names_round_trip() {
        for v in [Verdict::Pass, Verdict::Fail, Verdict::Pending] {
            assert_eq!(Verdict::from_name(v.name()).unwrap(), v);
        }
        assert!(Verdict::from_name("maybe").is_err());
    }
}
