//! Language selection policy.
//!
//! Languages are a questionnaire setting. With more than one on offer
//! the participant must pick before answering; a single configured
//! language selects itself; none configured means language plays no
//! part in the flow. The chosen language rides along in the snapshot,
//! rendering is someone else's concern.

use crate::error::CoreError;

/// What the session needs to do about languages before `InProgress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanguageRequirement {
    NotApplicable,
    AutoSelect(String),
    ChoiceRequired(Vec<String>),
}

/// Decide the language step. `preset` is a preference recorded at
/// invitation time (token data); it short-circuits the choice when it
/// is actually on offer.
pub fn language_requirement(languages: &[String], preset: Option<&str>) -> LanguageRequirement {
    if let Some(preset) = preset {
        if languages.iter().any(|l| l == preset) {
            return LanguageRequirement::AutoSelect(preset.to_string());
        }
    }
    match languages {
        [] => LanguageRequirement::NotApplicable,
        [only] => LanguageRequirement::AutoSelect(only.clone()),
        many => LanguageRequirement::ChoiceRequired(many.to_vec()),
    }
}

/// True when resolution must hold the session for an explicit choice.
pub fn needs_language_choice(languages: &[String], preset: Option<&str>) -> bool {
    matches!(
        language_requirement(languages, preset),
        LanguageRequirement::ChoiceRequired(_)
    )
}

/// Validate an explicit selection against the configured list.
pub fn validate_selection(languages: &[String], choice: &str) -> Result<(), CoreError> {
    if languages.iter().any(|l| l == choice) {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Language '{choice}' is not offered. Must be one of: {}",
            languages.join(", ")
        )))
    }
}
