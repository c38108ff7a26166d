//! Scoped client-side persistence for questionnaire sessions.
//!
//! Key items:
//!
//! - [`ScopedStore`] — synchronous string storage keyed by scope + key
//! - [`MemoryStore`] / [`FileStore`] — in-process and on-disk backends
//! - [`SnapshotRepo`] — typed save/load of [`fieldwork_core::SessionSnapshot`]
//!   plus the restore policy (resume, already-submitted, discard-stale)
//! - [`StagingRepo`] — staging token for post-submission registration

pub mod backend;
pub mod error;
pub mod file;
pub mod memory;
pub mod snapshots;
pub mod staging;

pub use backend::ScopedStore;
pub use error::StoreError;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use snapshots::{RestoreDecision, SnapshotRepo};
pub use staging::StagingRepo;
