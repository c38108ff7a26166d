//! File-backed storage backend.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use fieldwork_core::SnapshotScope;

use crate::backend::ScopedStore;
use crate::error::StoreError;

/// File-backed [`ScopedStore`].
///
/// Each scope maps to a subdirectory of the root (`tab/`, `shared/`),
/// each key to one `.json` file inside it. Keys are reduced to
/// `[A-Za-z0-9_-]` so they always map to a plain file name.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root`. Directories are created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, scope: SnapshotScope, key: &str) -> PathBuf {
        self.root
            .join(scope.name())
            .join(format!("{}.json", sanitize_key(key)))
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl ScopedStore for FileStore {
    fn read(&self, scope: SnapshotScope, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(scope, key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn write(&self, scope: SnapshotScope, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(scope, key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, value)?;
        Ok(())
    }

    fn remove(&self, scope: SnapshotScope, key: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(scope, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
