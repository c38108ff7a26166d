//! Conditional-logic evaluator — pure logic, no I/O.
//!
//! Answers feed branching rules; the evaluator returns a **full filtered
//! section list** so downstream consumers keep ordering and grouping.
//! Visibility is computed in one forward pass over document order: a rule
//! reads its source question's answer only when the source is already
//! visible, so an answer left behind by a now-hidden question is treated
//! as absent, and a rule referencing a *later* question sees absent too.
//! This also makes evaluation total on rule cycles.

use std::collections::HashSet;

use crate::question::{AnswerMap, AnswerValue, Question};
use crate::questionnaire::Section;
use crate::rules::{Combinator, Rule, RuleOperator, RuleSet};

// ---------------------------------------------------------------------------
// Filtered views
// ---------------------------------------------------------------------------

/// One section with only its currently-visible questions.
#[derive(Debug)]
pub struct SectionView<'a> {
    pub section: &'a Section,
    pub questions: Vec<&'a Question>,
}

impl SectionView<'_> {
    /// True when every question of the section is currently hidden.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

/// Apply every question's rule set against `answers` and return one view
/// per section, in order. Sections whose questions are all hidden stay in
/// the list as empty views.
pub fn filter_sections<'a>(sections: &'a [Section], answers: &AnswerMap) -> Vec<SectionView<'a>> {
    let mut visible_ids: HashSet<&str> = HashSet::new();
    let mut views = Vec::with_capacity(sections.len());

    for section in sections {
        let mut kept = Vec::new();
        for question in &section.questions {
            if question_visible(question, answers, &visible_ids) {
                visible_ids.insert(question.id.as_str());
                kept.push(question);
            }
        }
        views.push(SectionView {
            section,
            questions: kept,
        });
    }

    views
}

/// Count of visible questions across all sections.
pub fn visible_count(views: &[SectionView<'_>]) -> usize {
    views.iter().map(|v| v.questions.len()).sum()
}

fn question_visible(
    question: &Question,
    answers: &AnswerMap,
    visible_sources: &HashSet<&str>,
) -> bool {
    match &question.rules {
        None => true,
        Some(set) => rule_set_satisfied(set, answers, visible_sources),
    }
}

/// ALL of zero rules holds; ANY of zero rules fails. These are the
/// iterator identities and match how the builder treats degenerate sets.
fn rule_set_satisfied(
    set: &RuleSet,
    answers: &AnswerMap,
    visible_sources: &HashSet<&str>,
) -> bool {
    let satisfied = |rule: &Rule| rule_satisfied(rule, source_answer(rule, answers, visible_sources));
    match set.combinator {
        Combinator::All => set.rules.iter().all(satisfied),
        Combinator::Any => set.rules.iter().any(satisfied),
    }
}

fn source_answer<'a>(
    rule: &Rule,
    answers: &'a AnswerMap,
    visible_sources: &HashSet<&str>,
) -> Option<&'a AnswerValue> {
    if visible_sources.contains(rule.source.as_str()) {
        answers.get(&rule.source)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Single-rule evaluation
// ---------------------------------------------------------------------------

/// Evaluate one rule against an answer. `None` means the source answer is
/// absent: positive operators fail, negated operators hold.
pub fn rule_satisfied(rule: &Rule, answer: Option<&AnswerValue>) -> bool {
    match rule.operator {
        RuleOperator::Equals => equals(rule, answer),
        RuleOperator::NotEquals => !equals(rule, answer),
        RuleOperator::Contains => contains(rule, answer),
        RuleOperator::NotContains => !contains(rule, answer),
        RuleOperator::GreaterThan => numeric_cmp(rule, answer, |a, b| a > b),
        RuleOperator::GreaterOrEqual => numeric_cmp(rule, answer, |a, b| a >= b),
        RuleOperator::LessThan => numeric_cmp(rule, answer, |a, b| a < b),
        RuleOperator::LessOrEqual => numeric_cmp(rule, answer, |a, b| a <= b),
    }
}

fn equals(rule: &Rule, answer: Option<&AnswerValue>) -> bool {
    let Some(answer) = answer else { return false };
    // Numeric coercion first: "5" equals 5 regardless of which side the
    // builder stored as a string.
    if let (Some(a), Some(b)) = (answer.numeric(), value_number(&rule.value)) {
        return a == b;
    }
    match (answer.as_text(), value_text(&rule.value)) {
        (Some(text), Some(expected)) => text == expected,
        _ => false,
    }
}

fn contains(rule: &Rule, answer: Option<&AnswerValue>) -> bool {
    let Some(answer) = answer else { return false };
    let Some(needle) = value_text(&rule.value) else {
        return false;
    };
    if let Some(items) = answer.as_list() {
        // Membership for multi-select answers.
        items.iter().any(|item| *item == needle)
    } else if let Some(text) = answer.as_text() {
        text.contains(&needle)
    } else {
        false
    }
}

fn numeric_cmp(rule: &Rule, answer: Option<&AnswerValue>, cmp: fn(f64, f64) -> bool) -> bool {
    match (
        answer.and_then(AnswerValue::numeric),
        value_number(&rule.value),
    ) {
        (Some(a), Some(b)) => cmp(a, b),
        _ => false,
    }
}

/// Text form of a rule's comparison value.
fn value_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Numeric form of a rule's comparison value; string numbers parse.
fn value_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
