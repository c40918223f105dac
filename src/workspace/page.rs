//! Pages and favorites: the two leaf kinds stored in workspace trees

use crate::graph::ObjectGraph;
use crate::lineage::PageLineage;
use crate::order::OrderKey;
use crate::tree::{FolderId, TreeLeaf, TreeSnapshot};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a page
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
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

impl Default for PageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One cell of a cross-tabulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrosstabCell {
    pub row: String,
    pub column: String,
    pub value: String,
}

/// Row/column grid payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrosstabData {
    #[serde(default)]
    pub rows: Vec<String>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub cells: Vec<CrosstabCell>,
}

impl CrosstabData {
    pub fn new(rows: Vec<String>, columns: Vec<String>) -> Self {
        Self {
            rows,
            columns,
            cells: Vec::new(),
        }
    }

    pub fn cell(&self, row: &str, column: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|c| c.row == row && c.column == column)
            .map(|c| c.value.as_str())
    }

    /// Set a cell, replacing any previous value
    pub fn with_cell(mut self, row: impl Into<String>, column: impl Into<String>, value: impl Into<String>) -> Self {
        let (row, column) = (row.into(), column.into());
        self.cells.retain(|c| !(c.row == row && c.column == column));
        self.cells.push(CrosstabCell {
            row,
            column,
            value: value.into(),
        });
        self
    }
}

/// Kind-specific page payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PageKind {
    Regular {
        #[serde(default)]
        content: String,
    },
    Crosstab(CrosstabData),
    Object(ObjectGraph),
}

impl PageKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Regular { .. } => "regular",
            Self::Crosstab(_) => "crosstab",
            Self::Object(_) => "object",
        }
    }
}

/// A page in the workspace tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<FolderId>,
    #[serde(default)]
    pub order: OrderKey,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub lineage: PageLineage,
    pub kind: PageKind,
}

impl Page {
    fn with_kind(title: impl Into<String>, kind: PageKind) -> Self {
        Self {
            id: PageId::new(),
            title: title.into(),
            folder_id: None,
            order: OrderKey::first(),
            created_at: Utc::now(),
            updated_at: None,
            lineage: PageLineage::default(),
            kind,
        }
    }

    pub fn regular(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_kind(title, PageKind::Regular { content: content.into() })
    }

    pub fn crosstab(title: impl Into<String>, data: CrosstabData) -> Self {
        Self::with_kind(title, PageKind::Crosstab(data))
    }

    pub fn object(title: impl Into<String>, graph: ObjectGraph) -> Self {
        Self::with_kind(title, PageKind::Object(graph))
    }

    pub fn with_id(mut self, id: impl Into<PageId>) -> Self {
        self.id = id.into();
        self
    }

    /// Place in `folder` when inserted
    pub fn in_folder(mut self, folder: FolderId) -> Self {
        self.folder_id = Some(folder);
        self
    }

    pub fn object_graph(&self) -> Option<&ObjectGraph> {
        match &self.kind {
            PageKind::Object(graph) => Some(graph),
            _ => None,
        }
    }
}

impl TreeLeaf for Page {
    type Id = PageId;

    fn id(&self) -> &PageId {
        &self.id
    }
    fn folder_id(&self) -> Option<&FolderId> {
        self.folder_id.as_ref()
    }
    fn set_folder_id(&mut self, folder: Option<FolderId>) {
        self.folder_id = folder;
    }
    fn order(&self) -> OrderKey {
        self.order
    }
    fn set_order(&mut self, order: OrderKey) {
        self.order = order;
    }
}

/// Unique identifier for a favorite
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FavoriteId(String);

impl FavoriteId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for FavoriteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FavoriteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FavoriteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What a favorite points at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FavoriteTarget {
    #[serde(rename_all = "camelCase")]
    Page { page_id: PageId },
    /// Anything outside the page tree (a chat, a file, a URL)
    External { reference: String },
}

/// A bookmark in the favorites tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub id: FavoriteId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<FolderId>,
    #[serde(default)]
    pub order: OrderKey,
    pub created_at: DateTime<Utc>,
    pub target: FavoriteTarget,
}

impl Favorite {
    pub fn new(title: impl Into<String>, target: FavoriteTarget) -> Self {
        Self {
            id: FavoriteId::new(),
            title: title.into(),
            folder_id: None,
            order: OrderKey::first(),
            created_at: Utc::now(),
            target,
        }
    }

    pub fn to_page(title: impl Into<String>, page_id: PageId) -> Self {
        Self::new(title, FavoriteTarget::Page { page_id })
    }

    pub fn with_id(mut self, id: impl Into<FavoriteId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn in_folder(mut self, folder: FolderId) -> Self {
        self.folder_id = Some(folder);
        self
    }
}

impl TreeLeaf for Favorite {
    type Id = FavoriteId;

    fn id(&self) -> &FavoriteId {
        &self.id
    }
    fn folder_id(&self) -> Option<&FolderId> {
        self.folder_id.as_ref()
    }
    fn set_folder_id(&mut self, folder: Option<FolderId>) {
        self.folder_id = folder;
    }
    fn order(&self) -> OrderKey {
        self.order
    }
    fn set_order(&mut self, order: OrderKey) {
        self.order = order;
    }
}

/// Folders of pages
pub type PageTree = TreeSnapshot<Page>;

/// Folders of favorites
pub type FavoriteTree = TreeSnapshot<Favorite>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_kind_is_tagged_by_type() {
        let page = Page::regular("Notes", "hello").with_id("p1");
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["kind"], json!({"type": "regular", "content": "hello"}));
        assert_eq!(value["lineage"]["source"], json!("user"));

        let back: Page = serde_json::from_value(value).unwrap();
        assert_eq!(back, page);
    }

    #[test]
    fn object_page_round_trips() {
        let graph = ObjectGraph::with_root(crate::graph::ObjectNode::new("World", "setting").with_id("w"));
        let page = Page::object("World", graph.clone()).with_id("p2");
        let text = serde_json::to_string(&page).unwrap();
        let back: Page = serde_json::from_str(&text).unwrap();
        assert_eq!(back.object_graph(), Some(&graph));
        assert_eq!(back.kind.name(), "object");
    }

    #[test]
    fn crosstab_cells_replace() {
        let data = CrosstabData::new(vec!["r".into()], vec!["c".into()])
            .with_cell("r", "c", "1")
            .with_cell("r", "c", "2");
        assert_eq!(data.cell("r", "c"), Some("2"));
        assert_eq!(data.cells.len(), 1);
    }

    #[test]
    fn favorite_target_serializes_camel_case() {
        let fav = Favorite::to_page("Fav", PageId::from("p1")).with_id("f1");
        let value = serde_json::to_value(&fav).unwrap();
        assert_eq!(value["target"], json!({"type": "page", "pageId": "p1"}));
    }
}
