//! Typed snapshot persistence and the restore policy.

use fieldwork_core::snapshot::snapshot_key;
use fieldwork_core::types::EpochMillis;
use fieldwork_core::{SessionSnapshot, SnapshotScope};

use crate::backend::ScopedStore;
use crate::error::StoreError;

/// What a starting session should do with the stored snapshot.
#[derive(Debug)]
pub enum RestoreDecision {
    /// No usable snapshot; start fresh.
    Fresh,
    /// A live snapshot exists; resume from it.
    Resume(SessionSnapshot),
    /// The stored snapshot was already submitted; show the completion
    /// screen without contacting the backend.
    AlreadySubmitted(SessionSnapshot),
}

/// Typed persistence of [`SessionSnapshot`] values over a [`ScopedStore`].
pub struct SnapshotRepo;

impl SnapshotRepo {
    /// Persist `snapshot` under the questionnaire's snapshot key.
    ///
    /// The write is synchronous; the commit that produced the snapshot
    /// treats a failure as fatal.
    pub fn save(
        store: &dyn ScopedStore,
        scope: SnapshotScope,
        questionnaire_id: &str,
        snapshot: &SessionSnapshot,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(snapshot)?;
        store.write(scope, &snapshot_key(questionnaire_id), &json)
    }

    /// Load and deserialize the stored snapshot, if any.
    ///
    /// A snapshot that no longer parses is removed and reported as absent
    /// instead of surfacing a deserialization error.
    pub fn load(
        store: &dyn ScopedStore,
        scope: SnapshotScope,
        questionnaire_id: &str,
    ) -> Result<Option<SessionSnapshot>, StoreError> {
        let key = snapshot_key(questionnaire_id);
        let Some(raw) = store.read(scope, &key)? else {
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(
                    questionnaire_id,
                    error = %e,
                    "Discarding unreadable session snapshot",
                );
                store.remove(scope, &key)?;
                Ok(None)
            }
        }
    }

    /// Remove the stored snapshot, if any.
    pub fn clear(
        store: &dyn ScopedStore,
        scope: SnapshotScope,
        questionnaire_id: &str,
    ) -> Result<(), StoreError> {
        store.remove(scope, &snapshot_key(questionnaire_id))
    }

    /// Decide how a starting session treats the stored snapshot.
    ///
    /// Snapshots past their TTL are removed and reported as
    /// [`RestoreDecision::Fresh`]. Submitted snapshots short-circuit to
    /// the completion screen.
    pub fn restore_decision(
        store: &dyn ScopedStore,
        scope: SnapshotScope,
        questionnaire_id: &str,
        now_ms: EpochMillis,
    ) -> Result<RestoreDecision, StoreError> {
        let Some(snapshot) = Self::load(store, scope, questionnaire_id)? else {
            return Ok(RestoreDecision::Fresh);
        };

        if snapshot.is_stale(now_ms) {
            tracing::info!(
                questionnaire_id,
                age_ms = snapshot.age_ms(now_ms),
                "Discarding stale session snapshot",
            );
            Self::clear(store, scope, questionnaire_id)?;
            return Ok(RestoreDecision::Fresh);
        }

        if snapshot.submitted {
            return Ok(RestoreDecision::AlreadySubmitted(snapshot));
        }

        Ok(RestoreDecision::Resume(snapshot))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
