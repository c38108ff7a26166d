//! In-process storage backend.

use std::collections::HashMap;
use std::sync::RwLock;

use fieldwork_core::SnapshotScope;

use crate::backend::ScopedStore;
use crate::error::StoreError;

/// In-memory [`ScopedStore`] backed by a process-wide map.
///
/// Used by tests and the demo runner. Matches the semantics of the real
/// backends: last write wins, no per-entry locking.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<(SnapshotScope, String), String>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across both scopes.
    pub fn len(&self) -> usize {
        self.entries.read().map(|map| map.len()).unwrap_or(0)
    }

    /// True when no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ScopedStore for MemoryStore {
    fn read(&self, scope: SnapshotScope, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(&(scope, key.to_string())).cloned())
    }

    fn write(&self, scope: SnapshotScope, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.insert((scope, key.to_string()), value.to_string());
        Ok(())
    }

    fn remove(&self, scope: SnapshotScope, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        entries.remove(&(scope, key.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_missing_key_returns_none() {
        let store = MemoryStore::new();
        let value = store.read(SnapshotScope::Shared, "absent").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let store = MemoryStore::new();
        store.write(SnapshotScope::Shared, "k", "v1").unwrap();
        let value = store.read(SnapshotScope::Shared, "k").unwrap();
        assert_eq!(value.as_deref(), Some("v1"));
    }

    #[test]
    fn test_second_write_wins() {
        let store = MemoryStore::new();
        store.write(SnapshotScope::Shared, "k", "v1").unwrap();
        store.write(SnapshotScope::Shared, "k", "v2").unwrap();
        let value = store.read(SnapshotScope::Shared, "k").unwrap();
        assert_eq!(value.as_deref(), Some("v2"));
    }

    #[test]
    fn test_scopes_are_isolated() {
        let store = MemoryStore::new();
        store.write(SnapshotScope::PerTab, "k", "tab").unwrap();
        store.write(SnapshotScope::Shared, "k", "shared").unwrap();

        let tab = store.read(SnapshotScope::PerTab, "k").unwrap();
        let shared = store.read(SnapshotScope::Shared, "k").unwrap();
        assert_eq!(tab.as_deref(), Some("tab"));
        assert_eq!(shared.as_deref(), Some("shared"));
    }

    #[test]
    fn test_remove_only_touches_one_scope() {
        let store = MemoryStore::new();
        store.write(SnapshotScope::PerTab, "k", "tab").unwrap();
        store.write(SnapshotScope::Shared, "k", "shared").unwrap();

        store.remove(SnapshotScope::PerTab, "k").unwrap();
        assert_eq!(store.read(SnapshotScope::PerTab, "k").unwrap(), None);
        assert_eq!(
            store.read(SnapshotScope::Shared, "k").unwrap().as_deref(),
            Some("shared")
        );
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let store = MemoryStore::new();
        assert!(store.remove(SnapshotScope::Shared, "absent").is_ok());
    }

    #[test]
    fn test_len_counts_both_scopes() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.write(SnapshotScope::PerTab, "a", "1").unwrap();
        store.write(SnapshotScope::Shared, "a", "2").unwrap();
        assert_eq!(store.len(), 2);
    }
}
