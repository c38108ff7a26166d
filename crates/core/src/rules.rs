//! Branching rule model for conditional question visibility.
//!
//! Rules are authored on a question and reference an earlier question's
//! answer. The evaluation itself lives in [`crate::visibility`]; this
//! module only defines the shapes and their well-formedness checks.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::QuestionId;

// ---------------------------------------------------------------------------
// Operators
// ---------------------------------------------------------------------------

/// Comparison applied between a source question's answer and the rule value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    /// For list-valued answers: the rule value is one of the selected
    /// elements. For text answers: substring match.
    Contains,
    NotContains,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
}

impl RuleOperator {
    /// Wire name, as stored by the questionnaire builder.
    pub fn name(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::NotEquals => "not_equals",
            Self::Contains => "contains",
            Self::NotContains => "not_contains",
            Self::GreaterThan => "greater_than",
            Self::GreaterOrEqual => "greater_or_equal",
            Self::LessThan => "less_than",
            Self::LessOrEqual => "less_or_equal",
        }
    }

    /// True for the operators that compare parsed numeric answers.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::GreaterThan | Self::GreaterOrEqual | Self::LessThan | Self::LessOrEqual
        )
    }
}

// ---------------------------------------------------------------------------
// Rules and rule sets
// ---------------------------------------------------------------------------

/// How the rules of a [`RuleSet`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Combinator {
    /// Every rule must hold.
    All,
    /// At least one rule must hold.
    Any,
}

/// One branching condition on a source question's answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Id of the question whose answer is inspected.
    pub source: QuestionId,
    pub operator: RuleOperator,
    /// Comparison value. Scalars for equality/numeric operators; the
    /// builder stores numbers as either JSON numbers or strings, so the
    /// evaluator parses leniently.
    pub value: serde_json::Value,
}

/// A combinator plus its rules. A question without a rule set is always
/// visible; a rule set with zero rules is treated by the evaluator per
/// its combinator identity (ALL of nothing holds, ANY of nothing fails).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub combinator: Combinator,
    pub rules: Vec<Rule>,
}

/// Check that every rule in `set` references a question id present in
/// `known_ids`. Builder data occasionally carries rules pointing at
/// deleted questions; those must be rejected before a session starts.
pub fn validate_rule_sources(set: &RuleSet, known_ids: &[QuestionId]) -> Result<(), CoreError> {
    for rule in &set.rules {
        if !known_ids.contains(&rule.source) {
            return Err(CoreError::Validation(format!(
                "Branching rule references unknown question '{}'",
                rule.source
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
