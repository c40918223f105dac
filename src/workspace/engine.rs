//! WorkspaceEngine: the main entry point for editing workspaces
//!
//! Workspaces live in memory as immutable `Arc` snapshots. A dispatched
//! command produces a new snapshot that replaces the old one wholesale, and
//! the engine persists it when a store is attached.

use super::command::{Command, ObjectCommand, Transition};
use super::interchange::{self, ImportMode, ObjectData};
use super::page::PageId;
use super::{Workspace, WorkspaceId};
use crate::error::{ArborError, ArborResult};
use crate::generation::{CancellationToken, GenerationKind, GenerationPipeline, GenerationPlan, Generator};
use crate::graph::{NodeId, ObjectGraph};
use crate::query::ContextAssembler;
use crate::storage::SnapshotStore;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// The main Arbor engine
///
/// Manages workspaces and routes commands to them, optionally persisting
/// every change to a [`SnapshotStore`].
#[derive(Default)]
pub struct WorkspaceEngine {
    workspaces: DashMap<WorkspaceId, Arc<Workspace>>,
    store: Option<Arc<dyn SnapshotStore>>,
}

impl std::fmt::Debug for WorkspaceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkspaceEngine")
            .field("workspaces", &self.workspaces.len())
            .field("persistent", &self.store.is_some())
            .finish()
    }
}

impl WorkspaceEngine {
    /// Create an in-memory engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine that persists to `store`
    ///
    /// Nothing is loaded yet; call [`load_all`](Self::load_all).
    pub fn with_store(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            workspaces: DashMap::new(),
            store: Some(store),
        }
    }

    /// Load every stored workspace into memory; returns how many were loaded
    pub fn load_all(&self) -> ArborResult<usize> {
        let Some(store) = &self.store else {
            return Ok(0);
        };
        let mut loaded = 0;
        for id in store.list_workspaces()? {
            if let Some(workspace) = store.load_workspace(&id)? {
                self.workspaces.insert(id, Arc::new(workspace));
                loaded += 1;
            }
        }
        info!(count = loaded, "loaded workspaces from store");
        Ok(loaded)
    }

    /// Create or replace a workspace. Returns its id.
    pub fn upsert_workspace(&self, workspace: Workspace) -> ArborResult<WorkspaceId> {
        let id = workspace.id.clone();
        self.persist(&workspace)?;
        self.workspaces.insert(id.clone(), Arc::new(workspace));
        Ok(id)
    }

    /// Get the current snapshot of a workspace
    pub fn get_workspace(&self, id: &WorkspaceId) -> Option<Arc<Workspace>> {
        self.workspaces.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Remove a workspace from memory and from the store
    pub fn remove_workspace(&self, id: &WorkspaceId) -> ArborResult<Option<Arc<Workspace>>> {
        if let Some(store) = &self.store {
            store.delete_workspace(id)?;
        }
        Ok(self.workspaces.remove(id).map(|(_, ws)| ws))
    }

    /// List workspace ids, ordered by name then id
    pub fn list_workspaces(&self) -> Vec<WorkspaceId> {
        let mut entries: Vec<(String, WorkspaceId)> = self
            .workspaces
            .iter()
            .map(|r| (r.value().name.clone(), r.key().clone()))
            .collect();
        entries.sort();
        entries.into_iter().map(|(_, id)| id).collect()
    }

    pub fn workspace_count(&self) -> usize {
        self.workspaces.len()
    }

    pub fn has_workspace(&self, id: &WorkspaceId) -> bool {
        self.workspaces.contains_key(id)
    }

    /// Apply one command to a workspace.
    ///
    /// On [`Transition::Changed`] the new snapshot replaces the old one and
    /// is persisted before this returns.
    pub fn dispatch(&self, id: &WorkspaceId, command: Command) -> ArborResult<Transition> {
        let mut slot = self
            .workspaces
            .get_mut(id)
            .ok_or_else(|| ArborError::WorkspaceNotFound(id.to_string()))?;
        let transition = slot.apply(command)?;
        if let Transition::Changed(next) = &transition {
            self.persist(next)?;
            *slot = Arc::new(next.clone());
        }
        Ok(transition)
    }

    /// Apply commands in order, stopping at the first error.
    /// Returns how many of them changed the workspace.
    pub fn dispatch_all(&self, id: &WorkspaceId, commands: impl IntoIterator<Item = Command>) -> ArborResult<usize> {
        let mut changed = 0;
        for command in commands {
            if self.dispatch(id, command)?.is_changed() {
                changed += 1;
            }
        }
        Ok(changed)
    }

    /// Export an object page's graph for interchange
    pub fn export_object(&self, id: &WorkspaceId, page: &PageId) -> ArborResult<ObjectData> {
        let workspace = self.require(id)?;
        let graph = Self::require_graph(&workspace, page)?;
        Ok(interchange::export(graph))
    }

    /// Import an interchange document into an object page
    pub fn import_object(
        &self,
        id: &WorkspaceId,
        page: &PageId,
        document: ObjectData,
        mode: ImportMode,
    ) -> ArborResult<Transition> {
        self.dispatch(
            id,
            Command::Object {
                page: page.clone(),
                command: ObjectCommand::Import { document, mode },
            },
        )
    }

    /// Render the context bundle for one node, or `None` if the node is gone
    pub fn context_bundle(&self, id: &WorkspaceId, page: &PageId, node: &NodeId) -> ArborResult<Option<String>> {
        let workspace = self.require(id)?;
        let graph = Self::require_graph(&workspace, page)?;
        Ok(ContextAssembler::new(graph)
            .full_context_bundle(node)
            .map(|bundle| bundle.render()))
    }

    /// Run one generation round-trip for a node and apply the result.
    ///
    /// The generator is awaited against a snapshot taken up front, with no
    /// lock held. The planned commands are then dispatched against whatever
    /// the workspace is by then, so edits made meanwhile are kept and
    /// commands whose targets vanished simply leave it unchanged. The
    /// returned plan and the recorded generation list only the nodes that
    /// were actually added.
    #[allow(clippy::too_many_arguments)]
    pub async fn generate(
        &self,
        id: &WorkspaceId,
        page: &PageId,
        node: &NodeId,
        kind: GenerationKind,
        prompt: &str,
        generator: &dyn Generator,
        cancel: &CancellationToken,
        pipeline: &GenerationPipeline,
    ) -> ArborResult<GenerationPlan> {
        let snapshot = self.require(id)?;
        let graph = Self::require_graph(&snapshot, page)?;
        let mut plan = pipeline.run(generator, graph, node, kind, prompt, cancel).await?;

        let mut added = Vec::new();
        let mut changed = 0;
        for command in plan.commands.iter().cloned() {
            let command = match command {
                ObjectCommand::RecordGeneration { mut record } => {
                    record.generated_node_ids.retain(|n| added.contains(n));
                    ObjectCommand::RecordGeneration { record }
                }
                other => other,
            };
            let new_node = match &command {
                ObjectCommand::AddNode { node, .. } => Some(node.id.clone()),
                _ => None,
            };
            let transition = self.dispatch(
                id,
                Command::Object {
                    page: page.clone(),
                    command,
                },
            )?;
            if transition.is_changed() {
                changed += 1;
                added.extend(new_node);
            }
        }
        if added.len() < plan.generated.len() {
            warn!(node = %node, planned = plan.generated.len(), added = added.len(), "generated nodes lost their parent");
        }
        plan.generated = added;
        debug!(workspace = %id, page = %page, node = %node, kind = %kind, changed, "applied generation");
        Ok(plan)
    }

    fn require(&self, id: &WorkspaceId) -> ArborResult<Arc<Workspace>> {
        self.get_workspace(id)
            .ok_or_else(|| ArborError::WorkspaceNotFound(id.to_string()))
    }

    fn require_graph<'w>(workspace: &'w Workspace, page: &PageId) -> ArborResult<&'w ObjectGraph> {
        match workspace.page(page) {
            None => Err(ArborError::PageNotFound(page.to_string())),
            Some(p) => p.object_graph().ok_or_else(|| {
                ArborError::precondition(format!("page {} is a {} page, not an object page", page, p.kind.name()))
            }),
        }
    }

    fn persist(&self, workspace: &Workspace) -> ArborResult<()> {
        if let Some(store) = &self.store {
            store.save_workspace(workspace)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::{ChildProposal, GenerationResponse, MockGenerator};
    use crate::graph::ObjectNode;
    use crate::storage::{OpenStore, SqliteStore};
    use crate::workspace::Page;

    fn world() -> ObjectGraph {
        ObjectGraph::with_root(ObjectNode::new("World", "setting").with_id("w"))
    }

    fn engine_with_page() -> (WorkspaceEngine, WorkspaceId, PageId) {
        let engine = WorkspaceEngine::new();
        let ws = Workspace::new("novel");
        let id = engine.upsert_workspace(ws).unwrap();
        let page = PageId::from("obj");
        engine
            .dispatch(
                &id,
                Command::AddPage {
                    page: Page::object("World", world()).with_id("obj"),
                },
            )
            .unwrap();
        (engine, id, page)
    }

    #[test]
    fn test_create_engine() {
        let engine = WorkspaceEngine::new();
        assert_eq!(engine.workspace_count(), 0);
        assert!(engine.list_workspaces().is_empty());
    }

    #[test]
    fn test_upsert_and_get_workspace() {
        let engine = WorkspaceEngine::new();
        let ws = Workspace::new("novel");
        let id = engine.upsert_workspace(ws.clone()).unwrap();

        assert!(engine.has_workspace(&id));
        assert_eq!(*engine.get_workspace(&id).unwrap(), ws);
    }

    #[test]
    fn test_list_workspaces_by_name() {
        let engine = WorkspaceEngine::new();
        let b = engine.upsert_workspace(Workspace::new("beta")).unwrap();
        let a = engine.upsert_workspace(Workspace::new("alpha")).unwrap();
        assert_eq!(engine.list_workspaces(), vec![a, b]);
    }

    #[test]
    fn test_remove_workspace() {
        let engine = WorkspaceEngine::new();
        let id = engine.upsert_workspace(Workspace::new("novel")).unwrap();

        assert!(engine.remove_workspace(&id).unwrap().is_some());
        assert!(engine.remove_workspace(&id).unwrap().is_none());
        assert_eq!(engine.workspace_count(), 0);
    }

    #[test]
    fn test_dispatch_replaces_snapshot() {
        let (engine, id, page) = engine_with_page();
        let before = engine.get_workspace(&id).unwrap();

        let transition = engine
            .dispatch(
                &id,
                Command::Object {
                    page: page.clone(),
                    command: ObjectCommand::AddNode {
                        node: ObjectNode::new("Port", "location").with_id("p"),
                        parent: Some(NodeId::from("w")),
                    },
                },
            )
            .unwrap();
        assert!(transition.is_changed());

        let after = engine.get_workspace(&id).unwrap();
        assert!(after.object_graph(&page).unwrap().contains(&NodeId::from("p")));
        // Readers holding the old snapshot are unaffected
        assert!(!before.object_graph(&page).unwrap().contains(&NodeId::from("p")));
    }

    #[test]
    fn test_dispatch_unknown_workspace() {
        let engine = WorkspaceEngine::new();
        let err = engine
            .dispatch(&WorkspaceId::from("nope"), Command::SweepLineage)
            .unwrap_err();
        assert!(matches!(err, ArborError::WorkspaceNotFound(_)));
    }

    #[test]
    fn test_dispatch_unchanged_keeps_snapshot() {
        let (engine, id, page) = engine_with_page();
        let before = engine.get_workspace(&id).unwrap();
        let transition = engine
            .dispatch(
                &id,
                Command::Object {
                    page,
                    command: ObjectCommand::DeleteNode { id: NodeId::from("ghost") },
                },
            )
            .unwrap();
        assert_eq!(transition, Transition::Unchanged);
        assert!(Arc::ptr_eq(&before, &engine.get_workspace(&id).unwrap()));
    }

    #[test]
    fn test_export_and_context_errors() {
        let (engine, id, page) = engine_with_page();
        assert!(engine.export_object(&id, &page).is_ok());

        let err = engine.export_object(&id, &PageId::from("missing")).unwrap_err();
        assert!(matches!(err, ArborError::PageNotFound(_)));

        let bundle = engine.context_bundle(&id, &page, &NodeId::from("w")).unwrap();
        assert!(bundle.unwrap().starts_with("# Context for World"));
        assert!(engine
            .context_bundle(&id, &page, &NodeId::from("ghost"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_import_object_replaces_graph() {
        let (engine, id, page) = engine_with_page();
        let other = world()
            .add_node(ObjectNode::new("Sea", "location").with_id("s"), Some(&NodeId::from("w")))
            .unwrap();

        let transition = engine
            .import_object(&id, &page, interchange::export(&other), ImportMode::Replace)
            .unwrap();
        assert!(transition.is_changed());
        let ws = engine.get_workspace(&id).unwrap();
        assert_eq!(ws.object_graph(&page).unwrap(), &other);
    }

    #[test]
    fn test_store_persists_changes() {
        let store: Arc<dyn SnapshotStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
        let engine = WorkspaceEngine::with_store(Arc::clone(&store));
        let id = engine.upsert_workspace(Workspace::new("novel")).unwrap();
        engine
            .dispatch(
                &id,
                Command::AddPage {
                    page: Page::regular("Notes", "hello").with_id("n"),
                },
            )
            .unwrap();

        let reloaded = WorkspaceEngine::with_store(Arc::clone(&store));
        assert_eq!(reloaded.load_all().unwrap(), 1);
        assert_eq!(reloaded.get_workspace(&id), engine.get_workspace(&id));

        reloaded.remove_workspace(&id).unwrap();
        assert!(store.load_workspace(&id).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_generate_applies_plan() {
        let (engine, id, page) = engine_with_page();
        let generator = MockGenerator::available().with_response(GenerationResponse::Children(vec![
            ChildProposal::new("Harbor"),
            ChildProposal::new("Lighthouse"),
        ]));

        let plan = engine
            .generate(
                &id,
                &page,
                &NodeId::from("w"),
                GenerationKind::Children,
                "places",
                &generator,
                &CancellationToken::new(),
                &GenerationPipeline::new(),
            )
            .await
            .unwrap();

        let ws = engine.get_workspace(&id).unwrap();
        let graph = ws.object_graph(&page).unwrap();
        assert_eq!(graph.root().unwrap().children, plan.generated);
        assert_eq!(graph.generation_history().len(), 1);
    }
}
