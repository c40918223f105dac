//! Arbor: Hierarchical Workspace Graph Engine
//!
//! Workspaces hold ordered folder trees of pages and favorites. Object pages
//! carry a graph of typed nodes with cross-links, and pages remember which
//! page they were derived from.
//!
//! # Core Concepts
//!
//! - **Order keys**: fractional sibling positions with renumbering on exhaustion
//! - **Trees**: folders plus leaves, edited through pure transitions
//! - **Object graphs**: a rooted hierarchy of nodes with typed connections
//! - **Lineage**: bidirectional source/derived links between pages
//! - **Commands**: every edit is a value applied to an immutable snapshot
//!
//! # Example
//!
//! ```
//! use arbor::{Command, Page, Workspace, WorkspaceEngine};
//!
//! let engine = WorkspaceEngine::new();
//! let id = engine.upsert_workspace(Workspace::new("novel")).unwrap();
//! let transition = engine
//!     .dispatch(&id, Command::AddPage { page: Page::regular("Notes", "") })
//!     .unwrap();
//! assert!(transition.is_changed());
//! ```

pub mod config;
pub mod error;
pub mod generation;
pub mod graph;
pub mod lineage;
pub mod order;
pub mod query;
pub mod storage;
pub mod tree;
pub mod workspace;

pub use config::{ArborConfig, ConfigError};
pub use error::{ArborError, ArborResult};
pub use generation::{CancellationToken, GenerationError, GenerationKind, GenerationPipeline, Generator};
pub use graph::{Connection, NodeId, ObjectGraph, ObjectNode, PropertyValue, Strength};
pub use lineage::{DerivationContext, LineageSource, LineageTracker};
pub use order::OrderKey;
pub use query::{ContextAssembler, SearchQuery};
pub use storage::{OpenStore, SnapshotStore, SqliteStore, StorageError, StorageResult};
pub use tree::{DeletePolicy, DropTarget, FolderId, TreeItem, TreeSnapshot};
pub use workspace::{
    Command, ImportMode, ObjectCommand, ObjectData, Page, PageId, Transition, TreeCommand, Workspace, WorkspaceEngine,
    WorkspaceId,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
