//! Storage backends for workspace snapshots
//!
//! Backends implement the `SnapshotStore` trait. The primary implementation
//! is `SqliteStore` for persistent storage.

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{OpenStore, SnapshotStore, StorageError, StorageResult};
