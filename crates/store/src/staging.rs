//! Staging-token persistence for the post-submission registration flow.
//!
//! When registration runs after the questionnaire, answers are staged on
//! the backend under a client-generated session token. The token is kept
//! locally so a reload during registration can still link the staged
//! submission to the participant created afterwards.

use fieldwork_core::SnapshotScope;

use crate::backend::ScopedStore;
use crate::error::StoreError;

/// Storage key for a questionnaire's staging token.
pub fn staging_key(questionnaire_id: &str) -> String {
    format!("staging_{questionnaire_id}")
}

/// Persists the temporary session token linking staged answers to a
/// participant registered afterwards. Always shared scope.
pub struct StagingRepo;

impl StagingRepo {
    /// Store the staging token for a questionnaire.
    pub fn save(
        store: &dyn ScopedStore,
        questionnaire_id: &str,
        token: &str,
    ) -> Result<(), StoreError> {
        store.write(SnapshotScope::Shared, &staging_key(questionnaire_id), token)
    }

    /// Retrieve the stored staging token, if any.
    pub fn load(
        store: &dyn ScopedStore,
        questionnaire_id: &str,
    ) -> Result<Option<String>, StoreError> {
        store.read(SnapshotScope::Shared, &staging_key(questionnaire_id))
    }

    /// Remove the stored staging token.
    pub fn clear(store: &dyn ScopedStore, questionnaire_id: &str) -> Result<(), StoreError> {
        store.remove(SnapshotScope::Shared, &staging_key(questionnaire_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn test_staging_key_format() {
        assert_eq!(staging_key("42"), "staging_42");
    }

    #[test]
    fn test_save_then_load_returns_token() {
        let store = MemoryStore::new();
        StagingRepo::save(&store, "42", "session_1700000000000_a1b2c3d4e").unwrap();

        let token = StagingRepo::load(&store, "42").unwrap();
        assert_eq!(token.as_deref(), Some("session_1700000000000_a1b2c3d4e"));
    }

    #[test]
    fn test_load_missing_returns_none() {
        let store = MemoryStore::new();
        assert_eq!(StagingRepo::load(&store, "42").unwrap(), None);
    }

    #[test]
    fn test_clear_removes_token() {
        let store = MemoryStore::new();
        StagingRepo::save(&store, "42", "session_1_abc").unwrap();
        StagingRepo::clear(&store, "42").unwrap();
        assert_eq!(StagingRepo::load(&store, "42").unwrap(), None);
    }

    #[test]
    fn test_tokens_keyed_per_questionnaire() {
        let store = MemoryStore::new();
        StagingRepo::save(&store, "42", "token-a").unwrap();
        StagingRepo::save(&store, "43", "token-b").unwrap();

        assert_eq!(StagingRepo::load(&store, "42").unwrap().as_deref(), Some("token-a"));
        assert_eq!(StagingRepo::load(&store, "43").unwrap().as_deref(), Some("token-b"));
    }
}
