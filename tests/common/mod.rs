//! Common fixtures for Arbor integration tests
//!
//! Builders for sample object graphs and workspaces, plus helpers for
//! applying commands that are expected to change something.

#![allow(dead_code)]

use arbor::{Command, NodeId, ObjectCommand, ObjectGraph, ObjectNode, Page, PageId, Workspace};
use rand::rngs::StdRng;
use rand::Rng;

pub fn nid(s: &str) -> NodeId {
    NodeId::from(s)
}

/// Sample hierarchy used across tests:
///
/// ```text
/// root
/// ├── a
/// │   ├── a1
/// │   │   └── a1x
/// │   └── a2
/// └── b
///     └── b1
/// ```
pub fn sample_graph() -> ObjectGraph {
    let mut graph = ObjectGraph::with_root(ObjectNode::new("Root", "setting").with_id("root"));
    for (id, name, parent) in [
        ("a", "Alpha", "root"),
        ("a1", "Alpha One", "a"),
        ("a1x", "Alpha One X", "a1"),
        ("a2", "Alpha Two", "a"),
        ("b", "Beta", "root"),
        ("b1", "Beta One", "b"),
    ] {
        graph = graph
            .add_node(ObjectNode::new(name, "item").with_id(id), Some(&nid(parent)))
            .expect("fixture node");
    }
    graph
}

/// A random tree of `size` nodes (root included) with ids `n0..n{size-1}`.
pub fn random_graph(rng: &mut StdRng, size: usize) -> ObjectGraph {
    let mut graph = ObjectGraph::with_root(ObjectNode::new("n0", "item").with_id("n0"));
    for i in 1..size {
        let parent = nid(&format!("n{}", rng.gen_range(0..i)));
        let id = format!("n{}", i);
        graph = graph
            .add_node(ObjectNode::new(&id, "item").with_id(id.as_str()), Some(&parent))
            .expect("random node");
    }
    graph
}

/// Apply a command that must change the workspace
pub fn apply(ws: &Workspace, command: Command) -> Workspace {
    ws.apply(command)
        .expect("command failed")
        .into_workspace()
        .expect("command left workspace unchanged")
}

pub fn object(page: &PageId, command: ObjectCommand) -> Command {
    Command::Object {
        page: page.clone(),
        command,
    }
}

/// Workspace with one object page holding `graph`
pub fn workspace_with_graph(graph: ObjectGraph) -> (Workspace, PageId) {
    let page = PageId::from("atlas");
    let ws = apply(
        &Workspace::new("novel"),
        Command::AddPage {
            page: Page::object("Atlas", graph).with_id("atlas"),
        },
    );
    (ws, page)
}

pub fn graph_of<'w>(ws: &'w Workspace, page: &PageId) -> &'w ObjectGraph {
    ws.object_graph(page).expect("object page")
}
