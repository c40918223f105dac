//! Page tree and lineage behaviour driven through workspace commands

mod common;

use arbor::tree::TreeLeaf;
use arbor::workspace::{Favorite, FavoriteTarget};
use arbor::{
    ArborError, Command, DeletePolicy, DerivationContext, DropTarget, FolderId, LineageSource, OrderKey, Page, PageId,
    Transition, TreeCommand, TreeItem, Workspace,
};
use common::apply;

fn fid(s: &str) -> FolderId {
    FolderId::from_string(s)
}

fn pid(s: &str) -> PageId {
    PageId::from(s)
}

fn create_folder(ws: &Workspace, id: &str, parent: Option<&str>) -> Workspace {
    apply(
        ws,
        Command::Pages(TreeCommand::CreateFolder {
            id: fid(id),
            name: id.to_uppercase(),
            parent: parent.map(fid),
        }),
    )
}

#[test]
fn drag_before_first_sibling_then_reject_cycle() {
    let ws = Workspace::new("novel");
    let ws = create_folder(&ws, "r", None);
    let ws = create_folder(&ws, "a", Some("r"));
    let ws = create_folder(&ws, "b", Some("r"));

    let order = |ws: &Workspace, id: &str| ws.pages.folder(&fid(id)).unwrap().order;
    assert_eq!(order(&ws, "a"), OrderKey::new(1000.0));
    assert_eq!(order(&ws, "b"), OrderKey::new(2000.0));

    let ws = apply(
        &ws,
        Command::Pages(TreeCommand::Drop {
            item: TreeItem::Folder(fid("b")),
            target: DropTarget::Gap {
                target: TreeItem::Folder(fid("a")),
                position: -1,
            },
        }),
    );
    assert!(order(&ws, "b") < order(&ws, "a"));
    assert_eq!(order(&ws, "b").value(), order(&ws, "a").value() - 1000.0);

    let result = ws.apply(Command::Pages(TreeCommand::MoveFolder {
        id: fid("r"),
        parent: Some(fid("a")),
        order: OrderKey::first(),
    }));
    assert!(matches!(result, Err(ArborError::CycleDetected { .. })));
    assert_eq!(ws.pages.folder(&fid("r")).unwrap().parent_id, None);
}

#[test]
fn folder_delete_flattens_but_cascade_removes_pages() {
    let ws = create_folder(&Workspace::new("novel"), "outer", None);
    let ws = create_folder(&ws, "inner", Some("outer"));
    let ws = apply(
        &ws,
        Command::AddPage {
            page: Page::regular("Chapter", "").with_id("ch").in_folder(fid("inner")),
        },
    );

    let flattened = apply(
        &ws,
        Command::Pages(TreeCommand::DeleteFolder {
            id: fid("inner"),
            policy: DeletePolicy::Flatten,
        }),
    );
    assert_eq!(flattened.page(&pid("ch")).unwrap().folder_id(), Some(&fid("outer")));

    let cascaded = apply(
        &ws,
        Command::Pages(TreeCommand::DeleteFolder {
            id: fid("outer"),
            policy: DeletePolicy::Cascade,
        }),
    );
    assert!(cascaded.page(&pid("ch")).is_none());
    assert_eq!(cascaded.pages.folder_count(), 0);
}

#[test]
fn missing_ids_report_unchanged() {
    let ws = Workspace::new("novel");
    for command in [
        Command::Pages(TreeCommand::RenameFolder {
            id: fid("ghost"),
            name: "x".into(),
        }),
        Command::RenamePage {
            id: pid("ghost"),
            title: "x".into(),
        },
        Command::RemovePage { id: pid("ghost") },
        Command::SweepLineage,
    ] {
        assert_eq!(ws.apply(command).unwrap(), Transition::Unchanged);
    }
}

#[test]
fn recorded_derivation_links_both_directions() {
    let ws = apply(
        &Workspace::new("novel"),
        Command::AddPage {
            page: Page::regular("Outline", "").with_id("a"),
        },
    );
    let ws = apply(
        &ws,
        Command::AddPage {
            page: Page::regular("Draft", "").with_id("b"),
        },
    );
    let ws = apply(
        &ws,
        Command::RecordDerivation {
            source: pid("a"),
            page: pid("b"),
            context: DerivationContext::new(LineageSource::Chat).with_context("expand act two"),
        },
    );

    let a = ws.page(&pid("a")).unwrap();
    let b = ws.page(&pid("b")).unwrap();
    assert_eq!(b.lineage.source_page_id.as_ref(), Some(&a.id));
    assert!(a.lineage.generated_page_ids.contains(&b.id));
    assert_eq!(b.lineage.source, LineageSource::Chat);
    assert_eq!(b.lineage.source_context.as_deref(), Some("expand act two"));

    // Deriving the source from its own descendant would close a loop
    let err = ws
        .apply(Command::RecordDerivation {
            source: pid("b"),
            page: pid("a"),
            context: DerivationContext::default(),
        })
        .unwrap_err();
    assert!(matches!(err, ArborError::CycleDetected { .. }));
}

#[test]
fn removed_source_leaves_dangling_lineage_until_swept() {
    let ws = apply(
        &Workspace::new("novel"),
        Command::AddPage {
            page: Page::regular("Outline", "").with_id("a"),
        },
    );
    let ws = apply(
        &ws,
        Command::DerivePage {
            source: pid("a"),
            page: Page::regular("Draft", "").with_id("b"),
            context: DerivationContext::default(),
        },
    );
    let ws = apply(&ws, Command::RemovePage { id: pid("a") });

    assert_eq!(ws.lineage().dangling_source(&pid("b")), Some(&pid("a")));
    assert!(ws.lineage().lineage_of(&pid("b")).is_empty());

    let ws = apply(&ws, Command::SweepLineage);
    assert!(ws.page(&pid("b")).unwrap().lineage.is_root());
}

#[test]
fn favorites_use_their_own_tree() {
    let ws = apply(
        &Workspace::new("novel"),
        Command::AddPage {
            page: Page::regular("Outline", "").with_id("a"),
        },
    );
    let ws = apply(
        &ws,
        Command::Favorites(TreeCommand::CreateFolder {
            id: fid("pins"),
            name: "Pins".into(),
            parent: None,
        }),
    );
    let ws = apply(
        &ws,
        Command::AddFavorite {
            favorite: Favorite::to_page("Outline", pid("a")).with_id("fav").in_folder(fid("pins")),
        },
    );

    assert!(ws.pages.folder(&fid("pins")).is_none());
    let favorite = ws.favorites.leaf(&"fav".into()).unwrap();
    assert_eq!(favorite.folder_id(), Some(&fid("pins")));
    assert_eq!(favorite.target, FavoriteTarget::Page { page_id: pid("a") });

    // Removing the page keeps the favorite pointing at it
    let ws = apply(&ws, Command::RemovePage { id: pid("a") });
    assert!(ws.favorites.leaf(&"fav".into()).is_some());
}
