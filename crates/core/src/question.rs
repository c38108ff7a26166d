//! Question and answer model.
//!
//! Question kinds are a closed tagged variant: the engine never inspects a
//! free-form type string. Each kind fixes the shape of an acceptable
//! [`AnswerValue`]; rendering details stay outside this crate.

use serde::{Deserialize, Serialize};

use crate::rules::RuleSet;
use crate::types::QuestionId;

// ---------------------------------------------------------------------------
// Question kinds
// ---------------------------------------------------------------------------

/// The closed set of supported question kinds.
///
/// Choice kinds carry their option labels and, for assessments, the
/// configured correct option indices (positions into `options`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QuestionKind {
    ShortText,
    LongText,
    Number,
    SingleChoice {
        options: Vec<String>,
        /// Correct option indices; empty when the question is not scored.
        #[serde(default)]
        correct: Vec<usize>,
        /// Whether an "Other, please specify" free-text option is offered.
        #[serde(default)]
        other_option: bool,
    },
    MultiChoice {
        options: Vec<String>,
        #[serde(default)]
        correct: Vec<usize>,
        #[serde(default)]
        max_selections: Option<usize>,
    },
    Dropdown {
        options: Vec<String>,
    },
    Likert {
        options: Vec<String>,
    },
    Rating {
        max: u8,
    },
    Slider {
        min: f64,
        max: f64,
    },
    Video {
        url: String,
        /// Mandatory-watch flag: the question only counts as answered
        /// once playback completes (see [`crate::video`]).
        #[serde(default)]
        must_complete: bool,
    },
}

impl QuestionKind {
    /// Human-readable kind label for messages and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ShortText => "short text",
            Self::LongText => "long text",
            Self::Number => "number",
            Self::SingleChoice { .. } => "single choice",
            Self::MultiChoice { .. } => "multiple choice",
            Self::Dropdown { .. } => "dropdown",
            Self::Likert { .. } => "likert",
            Self::Rating { .. } => "rating",
            Self::Slider { .. } => "slider",
            Self::Video { .. } => "video",
        }
    }

    /// Option labels for kinds that have them.
    pub fn options(&self) -> Option<&[String]> {
        match self {
            Self::SingleChoice { options, .. }
            | Self::MultiChoice { options, .. }
            | Self::Dropdown { options }
            | Self::Likert { options } => Some(options),
            _ => None,
        }
    }

    /// Configured correct option indices, when the kind is scoreable and
    /// at least one index is configured.
    pub fn correct_indices(&self) -> Option<&[usize]> {
        match self {
            Self::SingleChoice { correct, .. } | Self::MultiChoice { correct, .. }
                if !correct.is_empty() =>
            {
                Some(correct)
            }
            _ => None,
        }
    }

    /// Whether a per-question comment box may be offered for this kind.
    /// Free-text kinds never take comments (the answer is the text).
    pub fn supports_comments(&self) -> bool {
        matches!(
            self,
            Self::SingleChoice { .. }
                | Self::MultiChoice { .. }
                | Self::Dropdown { .. }
                | Self::Likert { .. }
                | Self::Rating { .. }
        )
    }

    /// Shape check: is `value` an acceptable answer for this kind?
    pub fn accepts(&self, value: &AnswerValue) -> bool {
        match self {
            Self::ShortText | Self::LongText => {
                matches!(value, AnswerValue::Text(_))
            }
            Self::Number | Self::Rating { .. } | Self::Slider { .. } => value.numeric().is_some(),
            Self::SingleChoice { .. } | Self::Dropdown { .. } | Self::Likert { .. } => {
                matches!(value, AnswerValue::Text(_) | AnswerValue::Detailed { .. })
            }
            Self::MultiChoice { .. } => matches!(value, AnswerValue::Choices(_)),
            Self::Video { .. } => matches!(value, AnswerValue::VideoWatch { .. }),
        }
    }
}

// ---------------------------------------------------------------------------
// Answer values
// ---------------------------------------------------------------------------

/// A participant's answer to one question.
///
/// Serialized untagged to match the backend's answer map: plain strings
/// for text and single selections, arrays for multi-selections, numbers
/// for numeric kinds, and small objects for "other" selections and video
/// watch state. Absence of an answer is `None` in the answer map, which
/// the completeness validator distinguishes from an empty string and an
/// empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(f64),
    Text(String),
    Choices(Vec<String>),
    /// A choice selection where "Other" was picked and specified.
    Detailed {
        value: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        other_text: Option<String>,
    },
    VideoWatch {
        completed: bool,
        watched_fraction: f64,
    },
}

impl AnswerValue {
    /// Whether the value is empty in the completeness sense: an empty
    /// string or an empty selection list. Numbers are never empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Choices(items) => items.is_empty(),
            Self::Detailed { value, .. } => value.is_empty(),
            Self::Number(_) | Self::VideoWatch { .. } => false,
        }
    }

    /// The scalar text of the answer, when it has one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Detailed { value, .. } => Some(value),
            _ => None,
        }
    }

    /// The selection list, for multi-select answers.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::Choices(items) => Some(items),
            _ => None,
        }
    }

    /// Numeric view of the answer. Text answers parse leniently because
    /// the builder stores slider/rating values as strings in older data.
    pub fn numeric(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Detailed { value, .. } => value.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Current answers of a session, keyed by question id. A `BTreeMap` keeps
/// snapshot serialization stable across runs.
pub type AnswerMap = std::collections::BTreeMap<QuestionId, AnswerValue>;

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// One item in the questionnaire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub title: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    /// Explicit required flag. `None` means the builder never set it;
    /// the completeness validator treats that as required for surveys.
    #[serde(default)]
    pub required: Option<bool>,
    /// Whether the builder enabled a comment box on this question.
    #[serde(default)]
    pub comment_enabled: bool,
    /// Branching rule set; absent means always visible.
    #[serde(default)]
    pub rules: Option<RuleSet>,
    /// Position within the owning section.
    #[serde(default)]
    pub order: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn single_choice(options: &[&str]) -> QuestionKind {
        QuestionKind::SingleChoice {
            options: options.iter().map(|s| s.to_string()).collect(),
            correct: vec![],
            other_option: false,
        }
    }

    // -- answer emptiness --

    #[test]
    fn empty_string_is_empty() {
        assert!(AnswerValue::Text(String::new()).is_empty());
    }

    #[test]
    fn empty_list_is_empty() {
        assert!(AnswerValue::Choices(vec![]).is_empty());
    }

    #[test]
    fn zero_is_not_empty() {
        assert!(!AnswerValue::Number(0.0).is_empty());
    }

    #[test]
    fn nonempty_text_is_not_empty() {
        assert!(!AnswerValue::Text("b".to_string()).is_empty());
    }

    // -- numeric parsing --

    #[test]
    fn numeric_from_number() {
        assert_eq!(AnswerValue::Number(7.5).numeric(), Some(7.5));
    }

    #[test]
    fn numeric_parses_text() {
        assert_eq!(AnswerValue::Text(" 42 ".to_string()).numeric(), Some(42.0));
    }

    #[test]
    fn numeric_rejects_non_number_text() {
        assert_eq!(AnswerValue::Text("hello".to_string()).numeric(), None);
        assert_eq!(AnswerValue::Choices(vec!["1".to_string()]).numeric(), None);
    }

    // -- shape acceptance --

    #[test]
    fn single_choice_accepts_text() {
        let kind = single_choice(&["A", "B"]);
        assert!(kind.accepts(&AnswerValue::Text("A".to_string())));
        assert!(!kind.accepts(&AnswerValue::Choices(vec!["A".to_string()])));
    }

    #[test]
    fn multi_choice_accepts_list_only() {
        let kind = QuestionKind::MultiChoice {
            options: vec!["A".to_string(), "B".to_string()],
            correct: vec![],
            max_selections: None,
        };
        assert!(kind.accepts(&AnswerValue::Choices(vec!["A".to_string()])));
        assert!(!kind.accepts(&AnswerValue::Text("A".to_string())));
    }

    #[test]
    fn rating_accepts_number_or_numeric_text() {
        let kind = QuestionKind::Rating { max: 5 };
        assert!(kind.accepts(&AnswerValue::Number(4.0)));
        assert!(kind.accepts(&AnswerValue::Text("4".to_string())));
        assert!(!kind.accepts(&AnswerValue::Text("four".to_string())));
    }

    #[test]
    fn video_accepts_watch_state_only() {
        let kind = QuestionKind::Video {
            url: "https://cdn.example/intro.mp4".to_string(),
            must_complete: true,
        };
        assert!(kind.accepts(&AnswerValue::VideoWatch {
            completed: true,
            watched_fraction: 1.0,
        }));
        assert!(!kind.accepts(&AnswerValue::Text("watched".to_string())));
    }

    // -- correct indices --

    #[test]
    fn correct_indices_none_when_unconfigured() {
        assert_eq!(single_choice(&["A", "B"]).correct_indices(), None);
    }

    #[test]
    fn correct_indices_present_when_configured() {
        let kind = QuestionKind::SingleChoice {
            options: vec!["A".to_string(), "B".to_string()],
            correct: vec![1],
            other_option: false,
        };
        assert_eq!(kind.correct_indices(), Some(&[1usize][..]));
    }

    // -- comments --

    #[test]
    fn choice_kinds_support_comments() {
        assert!(single_choice(&["A"]).supports_comments());
        assert!(QuestionKind::Rating { max: 5 }.supports_comments());
    }

    #[test]
    fn text_kinds_do_not_support_comments() {
        assert!(!QuestionKind::ShortText.supports_comments());
        assert!(!QuestionKind::LongText.supports_comments());
    }

    // -- wire shapes --

    #[test]
    fn answer_decodes_from_wire_shapes() {
        let text: AnswerValue = serde_json::from_value(json!("Blue")).unwrap();
        assert_eq!(text, AnswerValue::Text("Blue".to_string()));

        let list: AnswerValue = serde_json::from_value(json!(["Red", "Blue"])).unwrap();
        assert_eq!(
            list,
            AnswerValue::Choices(vec!["Red".to_string(), "Blue".to_string()])
        );

        let num: AnswerValue = serde_json::from_value(json!(3)).unwrap();
        assert_eq!(num, AnswerValue::Number(3.0));

        let other: AnswerValue =
            serde_json::from_value(json!({"value": "Other", "other_text": "sparrow"})).unwrap();
        assert_eq!(
            other,
            AnswerValue::Detailed {
                value: "Other".to_string(),
                other_text: Some("sparrow".to_string()),
            }
        );
    }

    #[test]
    fn question_deserializes_with_flattened_kind() {
        let q: Question = serde_json::from_value(json!({
            "id": "q1",
            "title": "Favourite colour?",
            "type": "single_choice",
            "options": ["Red", "Blue"],
            "required": false
        }))
        .unwrap();
        assert_eq!(q.id, "q1");
        assert_eq!(q.required, Some(false));
        assert_eq!(q.kind.options().unwrap().len(), 2);
        assert!(q.rules.is_none());
    }
}
