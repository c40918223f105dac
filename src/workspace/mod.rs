//! Workspaces: a page tree, a favorites tree, and the commands that edit them

mod command;
mod engine;
pub mod interchange;
mod page;

pub use command::{Command, ObjectCommand, Transition, TreeCommand};
pub use engine::WorkspaceEngine;
pub use interchange::{ImportMode, ObjectData};
pub use page::{
    CrosstabCell, CrosstabData, Favorite, FavoriteId, FavoriteTarget, FavoriteTree, Page, PageId, PageKind, PageTree,
};

use crate::graph::ObjectGraph;
use crate::lineage::LineageTracker;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a workspace
///
/// Serializes as a plain string (UUID or a semantic id like "ws:novel")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Create a new random WorkspaceId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for WorkspaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WorkspaceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for WorkspaceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Metadata about a workspace
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceMetadata {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// One workspace snapshot
///
/// Snapshots are values: [`Workspace::apply`] returns a new one and leaves
/// the receiver untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workspace {
    pub id: WorkspaceId,
    pub name: String,
    #[serde(default)]
    pub pages: PageTree,
    #[serde(default)]
    pub favorites: FavoriteTree,
    #[serde(default)]
    pub metadata: WorkspaceMetadata,
}

impl Workspace {
    /// Create an empty workspace with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(WorkspaceId::new(), name)
    }

    pub fn with_id(id: WorkspaceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            pages: PageTree::new(),
            favorites: FavoriteTree::new(),
            metadata: WorkspaceMetadata {
                created_at: Some(Utc::now()),
                ..Default::default()
            },
        }
    }

    pub fn page(&self, id: &PageId) -> Option<&Page> {
        self.pages.leaf(id)
    }

    /// The object graph of an object page
    pub fn object_graph(&self, page: &PageId) -> Option<&ObjectGraph> {
        self.page(page).and_then(Page::object_graph)
    }

    /// Pages whose title contains `needle`, case-insensitively, sorted by title
    pub fn find_pages(&self, needle: &str) -> Vec<&Page> {
        let needle = needle.to_lowercase();
        let mut pages: Vec<&Page> = self
            .pages
            .leaves()
            .filter(|p| p.title.to_lowercase().contains(&needle))
            .collect();
        pages.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));
        pages
    }

    pub fn lineage(&self) -> LineageTracker<'_> {
        LineageTracker::new(&self.pages)
    }
}
