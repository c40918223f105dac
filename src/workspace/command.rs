//! Commands: every workspace edit is one command mapped to one handler
//!
//! Handlers check the ids they reference up front and report
//! [`Transition::Unchanged`] when one is missing, so callers never compare
//! snapshots to learn whether anything happened.

use super::interchange::{self, ImportMode, ObjectData};
use super::page::{Favorite, FavoriteId, Page, PageId, PageKind};
use super::Workspace;
use crate::error::{ArborError, ArborResult};
use crate::graph::{Connection, NodeId, NodeUpdate, ObjectGenerationRecord, ObjectGraph, ObjectNode, PropertyValue};
use crate::lineage::DerivationContext;
use crate::order::OrderKey;
use crate::tree::{DeletePolicy, DropTarget, FolderId, TreeItem, TreeLeaf, TreeSnapshot};
use chrono::Utc;
use tracing::debug;

/// Outcome of applying a command
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The command applied; this is the new snapshot
    Changed(Workspace),
    /// A referenced id was missing or the command had nothing to do
    Unchanged,
}

impl Transition {
    pub fn is_changed(&self) -> bool {
        matches!(self, Self::Changed(_))
    }

    pub fn into_workspace(self) -> Option<Workspace> {
        match self {
            Self::Changed(ws) => Some(ws),
            Self::Unchanged => None,
        }
    }
}

/// Folder-level edits, shared by the page tree and the favorites tree
#[derive(Debug, Clone, PartialEq)]
pub enum TreeCommand<I> {
    CreateFolder {
        id: FolderId,
        name: String,
        parent: Option<FolderId>,
    },
    RenameFolder {
        id: FolderId,
        name: String,
    },
    DeleteFolder {
        id: FolderId,
        policy: DeletePolicy,
    },
    ClearFolder {
        id: FolderId,
    },
    ToggleFolder {
        id: FolderId,
    },
    MoveFolder {
        id: FolderId,
        parent: Option<FolderId>,
        order: OrderKey,
    },
    MoveLeaf {
        id: I,
        folder: Option<FolderId>,
        order: OrderKey,
    },
    Reorder {
        parent: Option<FolderId>,
        items: Vec<TreeItem<I>>,
    },
    Drop {
        item: TreeItem<I>,
        target: DropTarget<I>,
    },
}

impl<I> TreeCommand<I> {
    fn apply<L: TreeLeaf<Id = I>>(self, tree: &TreeSnapshot<L>) -> ArborResult<Option<TreeSnapshot<L>>> {
        let has_folder = |id: &FolderId| tree.folder(id).is_some();
        let next = match self {
            Self::CreateFolder { id, name, parent } => {
                if has_folder(&id) {
                    return Ok(None);
                }
                tree.create_folder_with_id(id, name, parent.as_ref())
            }
            Self::RenameFolder { id, name } => {
                if !has_folder(&id) {
                    return Ok(None);
                }
                tree.rename_folder(&id, name)
            }
            Self::DeleteFolder { id, policy } => {
                if !has_folder(&id) {
                    return Ok(None);
                }
                tree.delete_folder(&id, policy)
            }
            Self::ClearFolder { id } => {
                if !has_folder(&id) {
                    return Ok(None);
                }
                tree.clear_folder(&id)
            }
            Self::ToggleFolder { id } => {
                if !has_folder(&id) {
                    return Ok(None);
                }
                tree.toggle_folder(&id)
            }
            Self::MoveFolder { id, parent, order } => {
                if !has_folder(&id) || parent.as_ref().is_some_and(|p| p != &id && !has_folder(p)) {
                    return Ok(None);
                }
                tree.move_folder(&id, parent.as_ref(), order)?
            }
            Self::MoveLeaf { id, folder, order } => {
                if tree.leaf(&id).is_none() || folder.as_ref().is_some_and(|f| !has_folder(f)) {
                    return Ok(None);
                }
                tree.move_leaf(&id, folder.as_ref(), order)
            }
            Self::Reorder { parent, items } => {
                if parent.as_ref().is_some_and(|p| !has_folder(p)) {
                    return Ok(None);
                }
                tree.reorder_siblings(parent.as_ref(), &items)
            }
            Self::Drop { item, target } => {
                let target_exists = match &target {
                    DropTarget::IntoFolder { folder } => has_folder(folder),
                    DropTarget::Gap { target, .. } => tree.contains(target),
                };
                if !tree.contains(&item) || !target_exists {
                    return Ok(None);
                }
                tree.drop_item(&item, &target)?
            }
        };
        Ok(Some(next))
    }
}

/// Edits inside one object page's graph
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectCommand {
    AddNode {
        node: ObjectNode,
        parent: Option<NodeId>,
    },
    UpdateNode {
        id: NodeId,
        update: NodeUpdate,
    },
    DeleteNode {
        id: NodeId,
    },
    ClearChildren {
        id: NodeId,
    },
    MoveNode {
        id: NodeId,
        parent: NodeId,
        index: Option<usize>,
    },
    ReorderChildren {
        parent: NodeId,
        order: Vec<NodeId>,
    },
    ToggleExpansion {
        id: NodeId,
    },
    Expand {
        id: NodeId,
    },
    Collapse {
        id: NodeId,
    },
    Select {
        id: Option<NodeId>,
    },
    AddConnection {
        node: NodeId,
        connection: Connection,
    },
    UpdateConnection {
        node: NodeId,
        index: usize,
        connection: Connection,
    },
    RemoveConnection {
        node: NodeId,
        index: usize,
    },
    SetProperty {
        node: NodeId,
        key: String,
        value: PropertyValue,
    },
    RemoveProperty {
        node: NodeId,
        key: String,
    },
    RecordGeneration {
        record: ObjectGenerationRecord,
    },
    /// Opt-in sweep of connections whose target is gone
    PruneDangling,
    Import {
        document: ObjectData,
        mode: ImportMode,
    },
}

impl ObjectCommand {
    /// Apply to `graph`; `None` means nothing changed
    pub fn apply(self, graph: &ObjectGraph) -> ArborResult<Option<ObjectGraph>> {
        let has = |id: &NodeId| graph.contains(id);
        let connection_in_range =
            |node: &NodeId, index: usize| graph.node(node).is_some_and(|n| index < n.connections.len());

        let next = match self {
            Self::AddNode { node, parent } => {
                if parent.as_ref().is_some_and(|p| !has(p)) {
                    return Ok(None);
                }
                graph.add_node(node, parent.as_ref())?
            }
            Self::UpdateNode { id, update } => {
                if !has(&id) {
                    return Ok(None);
                }
                graph.update_node(&id, update)
            }
            Self::DeleteNode { id } => {
                if !has(&id) {
                    return Ok(None);
                }
                graph.delete_node(&id)
            }
            Self::ClearChildren { id } => {
                if !has(&id) {
                    return Ok(None);
                }
                graph.clear_children(&id)
            }
            Self::MoveNode { id, parent, index } => {
                if !has(&id) || !has(&parent) {
                    return Ok(None);
                }
                graph.move_node(&id, &parent, index)?
            }
            Self::ReorderChildren { parent, order } => {
                if !has(&parent) {
                    return Ok(None);
                }
                graph.reorder_children(&parent, &order)
            }
            Self::ToggleExpansion { id } => {
                if !has(&id) {
                    return Ok(None);
                }
                graph.toggle_expansion(&id)
            }
            Self::Expand { id } => {
                if !has(&id) || graph.is_expanded(&id) {
                    return Ok(None);
                }
                graph.expand(&id)
            }
            Self::Collapse { id } => {
                if !has(&id) || !graph.is_expanded(&id) {
                    return Ok(None);
                }
                graph.collapse(&id)
            }
            Self::Select { id } => {
                if id.as_ref().is_some_and(|i| !has(i)) || graph.selected_node_id() == id.as_ref() {
                    return Ok(None);
                }
                graph.select(id.as_ref())
            }
            Self::AddConnection { node, connection } => {
                if !has(&node) {
                    return Ok(None);
                }
                graph.add_connection(&node, connection)
            }
            Self::UpdateConnection { node, index, connection } => {
                if !connection_in_range(&node, index) {
                    return Ok(None);
                }
                graph.update_connection(&node, index, connection)
            }
            Self::RemoveConnection { node, index } => {
                if !connection_in_range(&node, index) {
                    return Ok(None);
                }
                graph.remove_connection(&node, index)
            }
            Self::SetProperty { node, key, value } => {
                if !has(&node) {
                    return Ok(None);
                }
                graph.set_property(&node, key, value)
            }
            Self::RemoveProperty { node, key } => {
                if !graph.node(&node).is_some_and(|n| n.properties.contains_key(&key)) {
                    return Ok(None);
                }
                graph.remove_property(&node, &key)
            }
            Self::RecordGeneration { record } => graph.record_generation(record),
            Self::PruneDangling => match graph.prune_dangling_connections() {
                (_, 0) => return Ok(None),
                (pruned, _) => pruned,
            },
            Self::Import { document, mode } => interchange::import(graph, document, mode)?,
        };
        Ok(Some(next))
    }
}

/// A workspace edit
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pages(TreeCommand<PageId>),
    Favorites(TreeCommand<FavoriteId>),
    AddPage {
        page: Page,
    },
    RenamePage {
        id: PageId,
        title: String,
    },
    /// Replace the text of a regular page
    EditContent {
        id: PageId,
        content: String,
    },
    /// Delete a page. Lineage neighbours and favorites are left as they are.
    RemovePage {
        id: PageId,
    },
    /// Insert `page` as derived from `source`
    DerivePage {
        source: PageId,
        page: Page,
        context: DerivationContext,
    },
    RecordDerivation {
        source: PageId,
        page: PageId,
        context: DerivationContext,
    },
    SweepLineage,
    AddFavorite {
        favorite: Favorite,
    },
    RemoveFavorite {
        id: FavoriteId,
    },
    Object {
        page: PageId,
        command: ObjectCommand,
    },
}

impl Command {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pages(_) => "pages",
            Self::Favorites(_) => "favorites",
            Self::AddPage { .. } => "add_page",
            Self::RenamePage { .. } => "rename_page",
            Self::EditContent { .. } => "edit_content",
            Self::RemovePage { .. } => "remove_page",
            Self::DerivePage { .. } => "derive_page",
            Self::RecordDerivation { .. } => "record_derivation",
            Self::SweepLineage => "sweep_lineage",
            Self::AddFavorite { .. } => "add_favorite",
            Self::RemoveFavorite { .. } => "remove_favorite",
            Self::Object { .. } => "object",
        }
    }
}

impl Workspace {
    /// Apply one command.
    ///
    /// Errors are reserved for cycle rejections and malformed input; a
    /// missing id yields [`Transition::Unchanged`].
    pub fn apply(&self, command: Command) -> ArborResult<Transition> {
        let name = command.name();
        let mut next = self.clone();
        let changed = match command {
            Command::Pages(cmd) => replace(&mut next.pages, cmd.apply(&self.pages)?),
            Command::Favorites(cmd) => replace(&mut next.favorites, cmd.apply(&self.favorites)?),
            Command::AddPage { page } => {
                if self.pages.leaf(page.id()).is_some() {
                    return Err(ArborError::precondition(format!("page {} already exists", page.id)));
                }
                next.pages = self.pages.insert_leaf(page);
                true
            }
            Command::RenamePage { id, title } => {
                if self.pages.leaf(&id).is_none() {
                    return Ok(Transition::Unchanged);
                }
                next.pages = self.pages.update_leaf(&id, |page| {
                    page.title = title;
                    page.updated_at = Some(Utc::now());
                });
                true
            }
            Command::EditContent { id, content } => {
                match self.pages.leaf(&id).map(|p| &p.kind) {
                    None => return Ok(Transition::Unchanged),
                    Some(PageKind::Regular { .. }) => {}
                    Some(other) => {
                        return Err(ArborError::precondition(format!(
                            "page {} is a {} page, not a regular one",
                            id,
                            other.name()
                        )))
                    }
                }
                next.pages = self.pages.update_leaf(&id, |page| {
                    page.kind = PageKind::Regular { content };
                    page.updated_at = Some(Utc::now());
                });
                true
            }
            Command::RemovePage { id } => {
                if self.pages.leaf(&id).is_none() {
                    return Ok(Transition::Unchanged);
                }
                next.pages = self.lineage().remove_page(&id);
                true
            }
            Command::DerivePage { source, page, context } => {
                next.pages = self.lineage().derive_page(&source, page, &context)?;
                true
            }
            Command::RecordDerivation { source, page, context } => {
                if self.pages.leaf(&page).is_none() {
                    return Ok(Transition::Unchanged);
                }
                next.pages = self.lineage().record_derivation(&source, &page, &context)?;
                true
            }
            Command::SweepLineage => {
                let (pages, removed) = self.lineage().sweep_dangling();
                next.pages = pages;
                removed > 0
            }
            Command::AddFavorite { favorite } => {
                if self.favorites.leaf(favorite.id()).is_some() {
                    return Err(ArborError::precondition(format!("favorite {} already exists", favorite.id)));
                }
                next.favorites = self.favorites.insert_leaf(favorite);
                true
            }
            Command::RemoveFavorite { id } => {
                if self.favorites.leaf(&id).is_none() {
                    return Ok(Transition::Unchanged);
                }
                next.favorites = self.favorites.remove_leaf(&id);
                true
            }
            Command::Object { page, command } => {
                let graph = match self.pages.leaf(&page).map(|p| &p.kind) {
                    None => return Ok(Transition::Unchanged),
                    Some(PageKind::Object(graph)) => graph,
                    Some(other) => {
                        return Err(ArborError::precondition(format!(
                            "page {} is a {} page, not an object page",
                            page,
                            other.name()
                        )))
                    }
                };
                match command.apply(graph)? {
                    None => false,
                    Some(updated) => {
                        next.pages = self.pages.update_leaf(&page, |p| {
                            p.kind = PageKind::Object(updated);
                            p.updated_at = Some(Utc::now());
                        });
                        true
                    }
                }
            }
        };

        if !changed {
            debug!(workspace = %self.id, command = name, "command left workspace unchanged");
            return Ok(Transition::Unchanged);
        }
        next.metadata.updated_at = Some(Utc::now());
        debug!(workspace = %self.id, command = name, "applied command");
        Ok(Transition::Changed(next))
    }
}

fn replace<T>(slot: &mut T, value: Option<T>) -> bool {
    match value {
        Some(value) => {
            *slot = value;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PageId {
        PageId::from(s)
    }

    fn nid(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn workspace() -> Workspace {
        let graph = ObjectGraph::with_root(ObjectNode::new("World", "setting").with_id("w"));
        let ws = Workspace::with_id("ws".into(), "Novel");
        let ws = ws
            .apply(Command::AddPage {
                page: Page::object("World", graph).with_id("obj"),
            })
            .unwrap()
            .into_workspace()
            .unwrap();
        ws.apply(Command::AddPage {
            page: Page::regular("Notes", "draft").with_id("notes"),
        })
        .unwrap()
        .into_workspace()
        .unwrap()
    }

    fn changed(ws: &Workspace, command: Command) -> Workspace {
        match ws.apply(command).unwrap() {
            Transition::Changed(next) => next,
            Transition::Unchanged => panic!("expected a change"),
        }
    }

    #[test]
    fn missing_ids_report_unchanged() {
        let ws = workspace();
        let cases = vec![
            Command::RenamePage {
                id: pid("ghost"),
                title: "x".into(),
            },
            Command::RemovePage { id: pid("ghost") },
            Command::Pages(TreeCommand::RenameFolder {
                id: FolderId::from("nope"),
                name: "x".into(),
            }),
            Command::Object {
                page: pid("ghost"),
                command: ObjectCommand::DeleteNode { id: nid("w") },
            },
            Command::Object {
                page: pid("obj"),
                command: ObjectCommand::DeleteNode { id: nid("ghost") },
            },
            Command::Object {
                page: pid("obj"),
                command: ObjectCommand::RemoveConnection {
                    node: nid("w"),
                    index: 3,
                },
            },
            Command::RemoveFavorite {
                id: FavoriteId::from("nope"),
            },
            Command::SweepLineage,
        ];
        for command in cases {
            let label = format!("{:?}", command);
            assert_eq!(ws.apply(command).unwrap(), Transition::Unchanged, "{}", label);
        }
    }

    #[test]
    fn object_commands_edit_the_page_graph() {
        let ws = workspace();
        let ws = changed(
            &ws,
            Command::Object {
                page: pid("obj"),
                command: ObjectCommand::AddNode {
                    node: ObjectNode::new("Port", "location").with_id("p"),
                    parent: Some(nid("w")),
                },
            },
        );
        let graph = ws.object_graph(&pid("obj")).unwrap();
        assert_eq!(graph.node(&nid("w")).unwrap().children, vec![nid("p")]);
        assert!(ws.page(&pid("obj")).unwrap().updated_at.is_some());
        assert!(ws.metadata.updated_at.is_some());
    }

    #[test]
    fn expand_twice_is_unchanged_the_second_time() {
        let ws = workspace();
        let expand = || Command::Object {
            page: pid("obj"),
            command: ObjectCommand::Expand { id: nid("w") },
        };
        let ws = changed(&ws, expand());
        assert_eq!(ws.apply(expand()).unwrap(), Transition::Unchanged);
    }

    #[test]
    fn object_command_on_regular_page_is_precondition() {
        let ws = workspace();
        let err = ws
            .apply(Command::Object {
                page: pid("notes"),
                command: ObjectCommand::Expand { id: nid("w") },
            })
            .unwrap_err();
        assert!(matches!(err, ArborError::Precondition(_)));
    }

    #[test]
    fn cycle_rejection_propagates() {
        let ws = workspace();
        let ws = changed(
            &ws,
            Command::Object {
                page: pid("obj"),
                command: ObjectCommand::AddNode {
                    node: ObjectNode::new("Port", "location").with_id("p"),
                    parent: Some(nid("w")),
                },
            },
        );
        let err = ws
            .apply(Command::Object {
                page: pid("obj"),
                command: ObjectCommand::MoveNode {
                    id: nid("w"),
                    parent: nid("p"),
                    index: None,
                },
            })
            .unwrap_err();
        assert!(matches!(err, ArborError::CycleDetected { .. }));
    }

    #[test]
    fn folder_commands_route_to_the_right_tree() {
        let ws = workspace();
        let folder = FolderId::from("drafts");
        let ws = changed(
            &ws,
            Command::Favorites(TreeCommand::CreateFolder {
                id: folder.clone(),
                name: "Drafts".into(),
                parent: None,
            }),
        );
        assert!(ws.favorites.folder(&folder).is_some());
        assert!(ws.pages.folder(&folder).is_none());

        let ws = changed(
            &ws,
            Command::Pages(TreeCommand::CreateFolder {
                id: folder.clone(),
                name: "Drafts".into(),
                parent: None,
            }),
        );
        let ws = changed(
            &ws,
            Command::Pages(TreeCommand::MoveLeaf {
                id: pid("notes"),
                folder: Some(folder.clone()),
                order: OrderKey::first(),
            }),
        );
        assert_eq!(ws.page(&pid("notes")).unwrap().folder_id, Some(folder));
    }

    #[test]
    fn derive_and_remove_pages() {
        let ws = workspace();
        let ws = changed(
            &ws,
            Command::DerivePage {
                source: pid("obj"),
                page: Page::regular("Tortuga", "").with_id("t"),
                context: DerivationContext::default().with_context("Tortuga"),
            },
        );
        assert_eq!(ws.page(&pid("t")).unwrap().lineage.source_page_id, Some(pid("obj")));

        let ws = changed(&ws, Command::RemovePage { id: pid("obj") });
        assert!(ws.page(&pid("t")).is_some());
        assert_eq!(ws.lineage().dangling_source(&pid("t")), Some(&pid("obj")));

        let ws = changed(&ws, Command::SweepLineage);
        assert!(ws.page(&pid("t")).unwrap().lineage.is_root());
    }

    #[test]
    fn edit_content_only_on_regular_pages() {
        let ws = workspace();
        let ws2 = changed(
            &ws,
            Command::EditContent {
                id: pid("notes"),
                content: "final".into(),
            },
        );
        assert_eq!(
            ws2.page(&pid("notes")).unwrap().kind,
            PageKind::Regular {
                content: "final".into()
            }
        );
        assert!(ws
            .apply(Command::EditContent {
                id: pid("obj"),
                content: "x".into(),
            })
            .is_err());
    }

    #[test]
    fn apply_leaves_receiver_untouched() {
        let ws = workspace();
        let before = ws.clone();
        let _ = changed(&ws, Command::RemovePage { id: pid("notes") });
        assert_eq!(ws, before);
    }
}
