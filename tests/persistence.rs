//! Engine state surviving a reopen of the SQLite store

mod common;

use arbor::{
    Command, DerivationContext, ImportMode, OpenStore, Page, PageId, SnapshotStore, SqliteStore, TreeCommand,
    WorkspaceEngine, Workspace,
};
use arbor::tree::FolderId;
use common::{nid, sample_graph, workspace_with_graph};
use std::sync::Arc;

fn open(path: &std::path::Path) -> WorkspaceEngine {
    let store = SqliteStore::open(path).unwrap();
    let engine = WorkspaceEngine::with_store(Arc::new(store));
    engine.load_all().unwrap();
    engine
}

#[test]
fn dispatched_changes_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("arbor.db");

    let graph = sample_graph();
    let (ws, page) = workspace_with_graph(graph.clone());
    let id = {
        let engine = open(&db);
        let id = engine.upsert_workspace(ws).unwrap();
        engine
            .dispatch_all(
                &id,
                [
                    Command::Pages(TreeCommand::CreateFolder {
                        id: FolderId::from_string("drafts"),
                        name: "Drafts".into(),
                        parent: None,
                    }),
                    Command::DerivePage {
                        source: page.clone(),
                        page: Page::regular("Notes", "from the atlas")
                            .with_id("notes")
                            .in_folder(FolderId::from_string("drafts")),
                        context: DerivationContext::default(),
                    },
                ],
            )
            .unwrap();
        id
    };

    let engine = open(&db);
    let ws = engine.get_workspace(&id).unwrap();
    assert_eq!(ws.name, "novel");
    assert_eq!(ws.object_graph(&page).unwrap(), &graph);
    let notes = ws.page(&PageId::from("notes")).unwrap();
    assert_eq!(notes.lineage.source_page_id.as_ref(), Some(&page));
    assert!(ws.page(&page).unwrap().lineage.generated_page_ids.contains(&notes.id));
}

#[test]
fn export_from_one_workspace_imports_into_another() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open(&dir.path().join("arbor.db"));

    let graph = sample_graph().expand(&nid("a"));
    let (source, page) = workspace_with_graph(graph.clone());
    let source_id = engine.upsert_workspace(source).unwrap();
    let (target, target_page) = workspace_with_graph(arbor::ObjectGraph::with_root(
        arbor::ObjectNode::new("Blank", "setting"),
    ));
    let target_id = engine.upsert_workspace(target).unwrap();

    let document = engine.export_object(&source_id, &page).unwrap();
    assert!(engine
        .import_object(&target_id, &target_page, document, ImportMode::Replace)
        .unwrap()
        .is_changed());

    let reopened = open(&dir.path().join("arbor.db"));
    let imported = reopened.get_workspace(&target_id).unwrap();
    assert_eq!(imported.object_graph(&target_page).unwrap(), &graph);
}

#[test]
fn removed_workspaces_are_gone_from_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("arbor.db");
    let store = Arc::new(SqliteStore::open(&db).unwrap());
    let engine = WorkspaceEngine::with_store(store.clone());

    let keep = engine.upsert_workspace(Workspace::new("keep")).unwrap();
    let drop = engine.upsert_workspace(Workspace::new("drop")).unwrap();
    engine.remove_workspace(&drop).unwrap();

    assert_eq!(store.list_workspaces().unwrap(), vec![keep.clone()]);
    assert_eq!(open(&db).list_workspaces(), vec![keep]);
}
