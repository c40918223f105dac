//! Folder records and the leaf abstraction shared by page and favorite trees

use crate::order::OrderKey;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::hash::Hash;
use uuid::Uuid;

/// Unique identifier for a folder
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(String);

impl FolderId {
    /// Create a new random FolderId
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create a FolderId from an existing string
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FolderId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for FolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FolderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A folder in an ordered tree
///
/// Folders nest through `parent_id`; the chain must stay acyclic and every
/// referenced parent must exist (absent means root level).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<FolderId>,
    pub order: OrderKey,
    #[serde(default)]
    pub expanded: bool,
    pub created_at: DateTime<Utc>,
}

impl Folder {
    /// Create a root-level folder with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(FolderId::new(), name)
    }

    /// Create a root-level folder with a specific id
    pub fn with_id(id: FolderId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
            order: OrderKey::first(),
            expanded: false,
            created_at: Utc::now(),
        }
    }
}

/// A non-folder item stored in a tree (a page, a favorite, ...)
///
/// Leaves live directly inside a folder or at root level and are never
/// parents of anything.
pub trait TreeLeaf: Clone + Debug + PartialEq + Serialize + DeserializeOwned {
    type Id: Clone + Eq + Hash + Ord + Debug + Display + Serialize + DeserializeOwned;

    fn id(&self) -> &Self::Id;
    fn folder_id(&self) -> Option<&FolderId>;
    fn set_folder_id(&mut self, folder: Option<FolderId>);
    fn order(&self) -> OrderKey;
    fn set_order(&mut self, order: OrderKey);
}

/// Reference to either kind of tree entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum TreeItem<I> {
    Folder(FolderId),
    Leaf(I),
}

impl<I: Display> Display for TreeItem<I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Folder(id) => write!(f, "folder {}", id),
            Self::Leaf(id) => write!(f, "item {}", id),
        }
    }
}

/// What happens to a folder's contents when the folder is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletePolicy {
    /// Child folders and leaves move up to the deleted folder's parent
    #[default]
    Flatten,
    /// The whole subtree, leaves included, is removed
    Cascade,
}
