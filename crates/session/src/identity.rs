//! Network half of identity resolution.
//!
//! Launch parameters name up to two opaque tokens; this module asks the
//! right validation endpoints about them and collects the answers into
//! [`TokenFindings`] for the pure resolution policy in
//! `fieldwork_core::access`. Validation failures are never fatal here:
//! a token that does not check out leaves its finding empty and the
//! session degrades to the registration flow.

use std::collections::BTreeMap;

use fieldwork_core::access::{
    GeneratedLinkInfo, Identity, LaunchParams, LinkTokenType, ParticipantTokenInfo, TokenFindings,
};
use fieldwork_platform::ResponseGateway;

/// What the validation endpoints said about the launch tokens, plus the
/// extra participant fields the core findings do not carry.
#[derive(Debug, Default)]
pub struct LaunchFindings {
    pub findings: TokenFindings,
    /// Additional participant fields recorded at invitation time
    /// (stringified), folded into the identity on token resolution.
    pub participant_details: BTreeMap<String, String>,
}

/// Interrogate the validation endpoints about the launch tokens.
///
/// Infallible by design: transport errors and invalid tokens are logged
/// and leave the matching finding empty.
pub async fn gather_findings(
    gateway: &dyn ResponseGateway,
    params: &LaunchParams,
) -> LaunchFindings {
    let mut out = LaunchFindings::default();

    if let Some(token) = params.encrypted_token() {
        match gateway.validate_encrypted_link(token).await {
            Ok(validation) => {
                out.findings.encrypted_link = validation
                    .link_type
                    .as_deref()
                    .and_then(|name| LinkTokenType::from_name(name).ok());
            }
            Err(e) => {
                tracing::warn!(error = %e, "Encrypted link validation failed; continuing without it");
            }
        }
    }

    let Some(token) = params.access_token() else {
        return out;
    };

    // A valid generated link settles the matter without consulting the
    // participant endpoint.
    match gateway.validate_generated_link(token).await {
        Ok(validation) if validation.valid => {
            if let Some(data) = validation.data {
                match LinkTokenType::from_name(&data.link_type) {
                    Ok(link_type) => {
                        out.findings.generated_link = Some(GeneratedLinkInfo {
                            tag: data.tag,
                            link_type,
                        });
                        return out;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Generated link carried an unknown link type");
                    }
                }
            }
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Generated link validation failed; trying the participant endpoint",
            );
        }
    }

    match gateway.validate_access_token(token).await {
        Ok(validation) if validation.valid => {
            if let Some(participant) = &validation.participant {
                out.participant_details = stringified(&participant.additional_data);
                out.findings.participant = Some(participant.to_info(validation.already_completed));
            }
        }
        Ok(_) => {
            tracing::info!("Access token invalid or expired; degrading to registration");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Access token validation failed; degrading to registration");
        }
    }

    out
}

/// Session identity for a token-resolved participant.
pub fn token_identity(
    info: &ParticipantTokenInfo,
    mut details: BTreeMap<String, String>,
    link_tag: Option<String>,
) -> Identity {
    if let Some(phone) = &info.phone {
        details.insert("phone".to_string(), phone.clone());
    }
    Identity {
        participant_id: Some(info.participant_id.clone()),
        name: info.name.clone().unwrap_or_default(),
        email: info.email.clone().unwrap_or_default(),
        is_anonymous: false,
        link_tag,
        details,
    }
}

fn stringified(data: &BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    data.iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_identity_carries_ids_and_phone() {
        let info = ParticipantTokenInfo {
            participant_id: "p-12".to_string(),
            name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            phone: Some("555-0100".to_string()),
            language: None,
            already_completed: false,
        };
        let mut details = BTreeMap::new();
        details.insert("organization".to_string(), "Acme".to_string());

        let identity = token_identity(&info, details, Some("wave-2".to_string()));
        assert_eq!(identity.participant_id.as_deref(), Some("p-12"));
        assert_eq!(identity.name, "Ada");
        assert!(!identity.is_anonymous);
        assert_eq!(identity.link_tag.as_deref(), Some("wave-2"));
        assert_eq!(identity.details.get("phone").map(String::as_str), Some("555-0100"));
        assert_eq!(
            identity.details.get("organization").map(String::as_str),
            Some("Acme")
        );
    }

    #[test]
    fn token_identity_tolerates_sparse_info() {
        let info = ParticipantTokenInfo {
            participant_id: "p-13".to_string(),
            ..Default::default()
        };
        let identity = token_identity(&info, BTreeMap::new(), None);
        assert_eq!(identity.name, "");
        assert_eq!(identity.email, "");
        assert!(identity.details.is_empty());
    }
}
