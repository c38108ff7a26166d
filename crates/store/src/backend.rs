//! Storage backend abstraction.

use fieldwork_core::SnapshotScope;

use crate::error::StoreError;

/// Synchronous string key/value storage partitioned by [`SnapshotScope`].
///
/// [`SnapshotScope::PerTab`] entries are visible only to the tab that
/// wrote them (a second tab starts clean); [`SnapshotScope::Shared`]
/// entries are visible across tabs. Concurrent writers race last-write
/// wins; there is no cross-writer locking.
pub trait ScopedStore: Send + Sync {
    /// Read the value stored under `key` in `scope`, if any.
    fn read(&self, scope: SnapshotScope, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key` in `scope`, replacing any previous value.
    fn write(&self, scope: SnapshotScope, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove the value stored under `key` in `scope`. Removing a missing
    /// key is not an error.
    fn remove(&self, scope: SnapshotScope, key: &str) -> Result<(), StoreError>;
}
