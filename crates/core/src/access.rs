//! Access-mode classification and identity resolution policy.
//!
//! Everything here is pure: launch parameters come in from the URL, the
//! outcomes of the token-validation calls come in as [`TokenFindings`],
//! and [`resolve`] merges the two into a [`Resolution`]. The network
//! half (choosing which validation endpoint to call and surviving its
//! failure) lives in the session crate.

use std::collections::BTreeMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::EpochMillis;

// ---------------------------------------------------------------------------
// Token classification
// ---------------------------------------------------------------------------

/// Raw tokens longer than this are encrypted link tokens carrying an
/// access-mode indicator; participant access tokens and generated link
/// tokens are 64 characters.
pub const ENCRYPTED_TOKEN_MIN_LEN: usize = 100;

/// What a raw `token` query parameter is, judged by length alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Participant access token or generated link token. Validated by
    /// trying the generated-link endpoint first, then the participant
    /// endpoint.
    Access,
    /// Encrypted link token; validated through its own endpoint, which
    /// answers with the link type instead of a participant.
    EncryptedLink,
}

/// Classify a raw token by the length policy.
pub fn token_kind(raw: &str) -> TokenKind {
    if raw.len() > ENCRYPTED_TOKEN_MIN_LEN {
        TokenKind::EncryptedLink
    } else {
        TokenKind::Access
    }
}

/// Link type carried by an encrypted link token or a generated link.
/// Generated links only come in `registration` and `anonymous` flavors;
/// encrypted tokens can additionally say `preview`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTokenType {
    Registration,
    Anonymous,
    Preview,
}

impl LinkTokenType {
    pub fn name(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Anonymous => "anonymous",
            Self::Preview => "preview",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "registration" => Ok(Self::Registration),
            "anonymous" => Ok(Self::Anonymous),
            "preview" => Ok(Self::Preview),
            other => Err(CoreError::Validation(format!(
                "Invalid link type '{other}'. Must be one of: registration, anonymous, preview"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Launch parameters
// ---------------------------------------------------------------------------

/// Query parameters a session can launch with. `token` is the modern
/// parameter and may hold any of the three token kinds; the rest are
/// legacy flags still honored on old links.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchParams {
    /// Opaque token: encrypted link, generated link, or participant access.
    pub token: Option<String>,
    /// Explicit generated-link token (`gltoken`).
    pub link_token: Option<String>,
    /// Legacy `type=registration` flag.
    pub registration_link: bool,
    /// Legacy `preview=true` flag.
    pub preview: bool,
    /// Legacy `mode=anonymous` flag.
    pub anonymous_mode: bool,
    /// `submitted=true`: returning from post-submission registration.
    pub returning_submitted: bool,
    /// Participant hint on the post-submission return leg.
    pub participant_id: Option<String>,
}

impl LaunchParams {
    /// Parse a raw query string (`a=1&b=2`). Tokens are URL-safe opaque
    /// strings, so no percent-decoding is applied.
    pub fn from_query(query: &str) -> Self {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|p| !p.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k, v),
                None => (pair, ""),
            });
        Self::from_pairs(pairs)
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            match key {
                "token" => params.token = Some(value.to_string()),
                "gltoken" => params.link_token = Some(value.to_string()),
                "type" => params.registration_link = value == "registration",
                "preview" => params.preview = value == "true",
                "mode" => params.anonymous_mode = value == "anonymous",
                "submitted" => params.returning_submitted = value == "true",
                "participant_id" => params.participant_id = Some(value.to_string()),
                _ => {}
            }
        }
        params
    }

    /// The token to try against the generated-link and participant
    /// endpoints, with `token` preferred over `gltoken` when both appear.
    /// An encrypted `token` leaves `gltoken` as the candidate.
    pub fn access_token(&self) -> Option<&str> {
        match &self.token {
            Some(token) if token_kind(token) == TokenKind::Access => Some(token),
            _ => self.link_token.as_deref(),
        }
    }

    /// The token parameter when it is an encrypted link token.
    pub fn encrypted_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .filter(|t| token_kind(t) == TokenKind::EncryptedLink)
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Who the session belongs to, as far as the engine knows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Backend participant id, once registered or token-resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_anonymous: bool,
    /// Generated-link tag, kept for the post-submission flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_tag: Option<String>,
    /// Extra registration fields (phone, organization, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, String>,
}

impl Identity {
    /// Pseudonymous identity for anonymous starts.
    pub fn anonymous(now_ms: EpochMillis) -> Self {
        Self {
            participant_id: None,
            name: format!("Anonymous_{now_ms}"),
            email: format!("anonymous_{now_ms}@anonymous.local"),
            is_anonymous: true,
            link_tag: None,
            details: BTreeMap::new(),
        }
    }

    /// Synthetic identity for preview sessions. Never registered.
    pub fn preview() -> Self {
        Self {
            participant_id: None,
            name: "Preview".to_string(),
            email: "preview@preview.local".to_string(),
            is_anonymous: false,
            link_tag: None,
            details: BTreeMap::new(),
        }
    }
}

/// Local guest reference for anonymous generated-link sessions, used as
/// the participant key until the backend assigns a real id.
pub fn guest_participant_id(tag: Option<&str>, now_ms: EpochMillis) -> String {
    format!("anon_{}_{now_ms}", tag.unwrap_or("unknown"))
}

/// Random-suffix length of staging tokens.
pub const STAGING_TOKEN_SUFFIX_LEN: usize = 9;

/// Generate the session token that keys a staged submission in the
/// post-submission registration flow: `session_{epoch_ms}_{suffix}`
/// with a lowercase alphanumeric suffix.
pub fn staging_token(now_ms: EpochMillis) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(STAGING_TOKEN_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("session_{now_ms}_{suffix}")
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// How the participant may proceed. Recorded in every snapshot; selects
/// the snapshot storage scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    Registration,
    Anonymous,
    Token,
    Preview,
}

impl AccessMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Anonymous => "anonymous",
            Self::Token => "token",
            Self::Preview => "preview",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "registration" => Ok(Self::Registration),
            "anonymous" => Ok(Self::Anonymous),
            "token" => Ok(Self::Token),
            "preview" => Ok(Self::Preview),
            other => Err(CoreError::Validation(format!(
                "Invalid access mode '{other}'. Must be one of: registration, anonymous, \
                 token, preview"
            ))),
        }
    }
}

/// Participant details answered by the access-token validation endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParticipantTokenInfo {
    pub participant_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Language preference recorded at invitation time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub already_completed: bool,
}

impl ParticipantTokenInfo {
    /// True when every mandatory registration field is prefilled.
    pub fn has_mandatory_fields(&self) -> bool {
        self.name.as_deref().is_some_and(|n| !n.trim().is_empty())
            && self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

/// Valid generated link: a shared tag plus registration/anonymous flavor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedLinkInfo {
    pub tag: String,
    pub link_type: LinkTokenType,
}

/// What the validation endpoints said about the launch tokens. A field
/// stays `None` when the matching token was absent, invalid, or expired;
/// an invalid token is never an error here.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenFindings {
    pub encrypted_link: Option<LinkTokenType>,
    pub generated_link: Option<GeneratedLinkInfo>,
    pub participant: Option<ParticipantTokenInfo>,
}

/// Resolved way forward for the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Collect participant fields. The degradation target for every
    /// invalid or expired token.
    Registration { link_tag: Option<String> },
    /// Skip registration; synthesize a pseudonymous identity.
    AnonymousStart { link_tag: Option<String> },
    /// Participant known from the token. `auto_advance` skips the
    /// identity-collection step when nothing more is needed from them.
    TokenResolved {
        participant: ParticipantTokenInfo,
        auto_advance: bool,
    },
    /// A completed response already exists for this participant.
    AlreadyCompleted { participant: ParticipantTokenInfo },
    /// Preview: synthetic identity, no persistence.
    PreviewStart,
}

impl Resolution {
    pub fn access_mode(&self) -> AccessMode {
        match self {
            Self::Registration { .. } => AccessMode::Registration,
            Self::AnonymousStart { .. } => AccessMode::Anonymous,
            Self::TokenResolved { .. } | Self::AlreadyCompleted { .. } => AccessMode::Token,
            Self::PreviewStart => AccessMode::Preview,
        }
    }
}

/// Merge launch parameters and token findings into a resolution.
///
/// Precedence: preview, then a known completed response, then anonymous
/// (from any of its three sources), then a resolved participant token,
/// then registration. A launch whose tokens all failed validation lands
/// on `Registration`.
///
/// `needs_language_choice` is true when the questionnaire offers more
/// than one language and the token did not pin one; it suppresses
/// auto-advance so the participant can pick before starting.
pub fn resolve(
    params: &LaunchParams,
    findings: &TokenFindings,
    needs_language_choice: bool,
) -> Resolution {
    if findings.encrypted_link == Some(LinkTokenType::Preview) || params.preview {
        return Resolution::PreviewStart;
    }

    if let Some(participant) = &findings.participant {
        if participant.already_completed {
            return Resolution::AlreadyCompleted {
                participant: participant.clone(),
            };
        }
    }

    let generated_anonymous = findings
        .generated_link
        .as_ref()
        .is_some_and(|link| link.link_type == LinkTokenType::Anonymous);
    if generated_anonymous
        || findings.encrypted_link == Some(LinkTokenType::Anonymous)
        || params.anonymous_mode
    {
        return Resolution::AnonymousStart {
            link_tag: findings.generated_link.as_ref().map(|l| l.tag.clone()),
        };
    }

    if let Some(participant) = &findings.participant {
        let auto_advance = participant.has_mandatory_fields() && !needs_language_choice;
        return Resolution::TokenResolved {
            participant: participant.clone(),
            auto_advance,
        };
    }

    Resolution::Registration {
        link_tag: findings.generated_link.as_ref().map(|l| l.tag.clone()),
    }
}
