//! Durable session snapshot: the single source of truth for resuming a
//! session after a reload.
//!
//! A snapshot is written synchronously on every committed mutation, so
//! restore-after-reload loses nothing up to the last mutation. The
//! restore policy (TTL, submitted short-circuit) lives with the stores;
//! this module owns the schema, the storage key, and the scope choice.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::access::{AccessMode, Identity};
use crate::navigation::Pointer;
use crate::phase::SessionPhase;
use crate::question::AnswerMap;
use crate::scoring::AssessmentOutcome;
use crate::types::{EpochMillis, QuestionId};

/// Snapshots older than this are discarded on load instead of resumed.
pub const SNAPSHOT_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Storage key for a questionnaire's session snapshot.
pub fn snapshot_key(questionnaire_id: &str) -> String {
    format!("questionnaire_{questionnaire_id}_session")
}

// ---------------------------------------------------------------------------
// Scope
// ---------------------------------------------------------------------------

/// Which of the two storage scopes a session persists in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotScope {
    /// Visible to the current tab only. A second tab restarts at
    /// identity collection.
    PerTab,
    /// Shared across tabs; reopening the link resumes mid-session.
    Shared,
}

impl SnapshotScope {
    /// Registration sessions are tab-scoped; every other mode shares.
    /// (Preview additionally skips persistence altogether, enforced by
    /// the engine, not here.)
    pub fn for_mode(mode: AccessMode) -> Self {
        match mode {
            AccessMode::Registration => Self::PerTab,
            AccessMode::Anonymous | AccessMode::Token | AccessMode::Preview => Self::Shared,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::PerTab => "tab",
            Self::Shared => "shared",
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Serialized session progress. Field names match the persisted JSON
/// schema, camel-cased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub identity: Identity,
    pub access_mode: AccessMode,
    pub phase: SessionPhase,
    #[serde(default)]
    pub pointer: Pointer,
    #[serde(default)]
    pub answers: AnswerMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub comments: BTreeMap<QuestionId, String>,
    /// Questions individually locked in (per-question assessment submits
    /// and poll answers).
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub submitted_question_ids: BTreeSet<QuestionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assessment_result: Option<AssessmentOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_language: Option<String>,
    #[serde(default)]
    pub submitted: bool,
    /// Session start, recovered on reload so the deadline clock does not
    /// reset.
    pub started_at: EpochMillis,
    /// Write time; drives the staleness check.
    pub saved_at: EpochMillis,
}

impl SessionSnapshot {
    /// Fresh snapshot at session start.
    pub fn new(
        identity: Identity,
        access_mode: AccessMode,
        phase: SessionPhase,
        now_ms: EpochMillis,
    ) -> Self {
        Self {
            identity,
            access_mode,
            phase,
            pointer: Pointer::default(),
            answers: AnswerMap::new(),
            comments: BTreeMap::new(),
            submitted_question_ids: BTreeSet::new(),
            assessment_result: None,
            selected_language: None,
            submitted: false,
            started_at: now_ms,
            saved_at: now_ms,
        }
    }

    /// Milliseconds since the last write, zero when the clock moved
    /// backwards.
    pub fn age_ms(&self, now_ms: EpochMillis) -> i64 {
        (now_ms - self.saved_at).max(0)
    }

    /// True once the snapshot has outlived the restore TTL.
    pub fn is_stale(&self, now_ms: EpochMillis) -> bool {
        self.age_ms(now_ms) > SNAPSHOT_TTL_MS
    }
}
