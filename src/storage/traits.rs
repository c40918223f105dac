//! Storage trait definitions

use crate::workspace::{Workspace, WorkspaceId};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence boundary for workspace snapshots
///
/// A snapshot is stored and loaded whole; there is no partial update and
/// no schema versioning. Implementations must be thread-safe (Send + Sync).
pub trait SnapshotStore: Send + Sync {
    /// Create or replace a workspace snapshot
    fn save_workspace(&self, workspace: &Workspace) -> StorageResult<()>;

    /// Load a workspace by ID
    fn load_workspace(&self, id: &WorkspaceId) -> StorageResult<Option<Workspace>>;

    /// Delete a workspace; returns whether it existed
    fn delete_workspace(&self, id: &WorkspaceId) -> StorageResult<bool>;

    /// List all workspace IDs, ordered by name
    fn list_workspaces(&self) -> StorageResult<Vec<WorkspaceId>>;
}

/// Extension trait for opening stores from paths
pub trait OpenStore: SnapshotStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StorageResult<Self>;
}
