//! Participant registration form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::access::{Identity, ParticipantTokenInfo};
use crate::error::CoreError;

/// The details collected before (or, in the post-submission flow,
/// after) answering. Name and email are the mandatory fields; anything
/// the questionnaire additionally asks for rides in `additional`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct RegistrationForm {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional: BTreeMap<String, String>,
}

impl RegistrationForm {
    /// Trim the text fields. Call before [`RegistrationForm::validated`]
    /// so whitespace-only names fail the length check.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_string();
        self.phone = self
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self
    }

    /// Run the field validators, folding the outcome into a single
    /// actionable message.
    pub fn validated(&self) -> Result<(), CoreError> {
        self.validate().map_err(|errors| {
            let field_errors = errors.field_errors();
            let message = ["name", "email"]
                .into_iter()
                .find_map(|field| {
                    field_errors
                        .get(field)
                        .and_then(|errs| errs.first())
                        .and_then(|err| err.message.as_ref())
                        .map(ToString::to_string)
                })
                .unwrap_or_else(|| "Invalid registration details".to_string());
            CoreError::Validation(message)
        })
    }

    /// Prefill from token-resolved participant details.
    pub fn prefill(info: &ParticipantTokenInfo) -> Self {
        Self {
            name: info.name.clone().unwrap_or_default(),
            email: info.email.clone().unwrap_or_default(),
            phone: info.phone.clone(),
            additional: BTreeMap::new(),
        }
    }

    /// The identity this form registers.
    pub fn into_identity(self, participant_id: Option<String>) -> Identity {
        let mut details = self.additional;
        if let Some(phone) = self.phone {
            details.insert("phone".to_string(), phone);
        }
        Identity {
            participant_id,
            name: self.name,
            email: self.email,
            is_anonymous: false,
            link_tag: None,
            details,
        }
    }
}
