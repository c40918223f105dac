//! ObjectData documents: the import/export shape of an object graph

use crate::error::{ArborError, ArborResult};
use crate::graph::{NodeId, ObjectGenerationRecord, ObjectGraph, ObjectNode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

/// Externally supplied object graph document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectData {
    #[serde(default)]
    pub root_node_id: Option<NodeId>,
    #[serde(default)]
    pub nodes: HashMap<NodeId, ObjectNode>,
    #[serde(default)]
    pub expanded_nodes: Vec<NodeId>,
    #[serde(default)]
    pub generation_history: Vec<ObjectGenerationRecord>,
}

/// How an imported document combines with the target graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Discard the target and take the document wholesale
    #[default]
    Replace,
    /// Upsert document nodes by id; a foreign root is grafted under the target root
    Merge,
}

impl std::str::FromStr for ImportMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replace" => Ok(Self::Replace),
            "merge" => Ok(Self::Merge),
            _ => Err(format!("unknown import mode: {}", s)),
        }
    }
}

/// Snapshot a graph as an interchange document. Selection is not exported.
pub fn export(graph: &ObjectGraph) -> ObjectData {
    ObjectData {
        root_node_id: graph.root_node_id.clone(),
        nodes: graph.nodes.clone(),
        expanded_nodes: graph.expanded_nodes.iter().cloned().collect(),
        generation_history: graph.generation_history.clone(),
    }
}

/// Combine `doc` with `target` according to `mode`.
///
/// The result must satisfy the tree invariants; a document that would
/// leave orphans, cycles or a missing root is rejected as a precondition
/// violation and `target` is left as it was.
pub fn import(target: &ObjectGraph, doc: ObjectData, mode: ImportMode) -> ArborResult<ObjectGraph> {
    let graph = match mode {
        ImportMode::Merge if target.root_node_id.is_some() => merge(target, doc),
        _ => replace(doc)?,
    };
    if let Some(issue) = graph.check_integrity().into_iter().next() {
        return Err(ArborError::precondition(format!("imported graph is inconsistent: {}", issue)));
    }
    debug!(nodes = graph.node_count(), ?mode, "imported object data");
    Ok(graph)
}

fn replace(doc: ObjectData) -> ArborResult<ObjectGraph> {
    match &doc.root_node_id {
        None if !doc.nodes.is_empty() => {
            return Err(ArborError::precondition("document has nodes but no rootNodeId"))
        }
        Some(root) if !doc.nodes.contains_key(root) => {
            return Err(ArborError::precondition(format!("root node {} is not in the document", root)))
        }
        _ => {}
    }
    let mut graph = ObjectGraph {
        root_node_id: doc.root_node_id,
        nodes: doc.nodes,
        expanded_nodes: BTreeSet::new(),
        selected_node_id: None,
        generation_history: doc.generation_history,
    };
    sync_expanded(&mut graph, doc.expanded_nodes);
    Ok(graph)
}

fn merge(target: &ObjectGraph, doc: ObjectData) -> ObjectGraph {
    let mut graph = target.clone();
    let target_root = target.root_node_id.clone();

    for (id, mut node) in doc.nodes {
        if Some(&id) == target_root.as_ref() {
            node.parent_id = None;
        } else if Some(&id) == doc.root_node_id.as_ref() && node.parent_id.is_none() {
            node.parent_id = target_root.clone();
        }
        graph.nodes.insert(id, node);
    }
    relink_children(&mut graph);

    let mut expanded: Vec<NodeId> = graph.expanded_nodes.iter().cloned().collect();
    expanded.extend(doc.expanded_nodes);
    sync_expanded(&mut graph, expanded);

    let known: HashSet<String> = graph.generation_history.iter().map(|r| r.id.clone()).collect();
    graph
        .generation_history
        .extend(doc.generation_history.into_iter().filter(|r| !known.contains(&r.id)));
    graph
}

/// Rebuild every `children` list from `parent_id` pointers, keeping the
/// existing order and appending newly attached children by id.
fn relink_children(graph: &mut ObjectGraph) {
    let mut by_parent: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for node in graph.nodes.values() {
        if let Some(parent) = &node.parent_id {
            by_parent.entry(parent.clone()).or_default().push(node.id.clone());
        }
    }
    for (id, node) in graph.nodes.iter_mut() {
        let mut attached = by_parent.remove(id).unwrap_or_default();
        attached.sort();
        let mut children: Vec<NodeId> = node.children.iter().filter(|c| attached.contains(c)).cloned().collect();
        for child in attached {
            if !children.contains(&child) {
                children.push(child);
            }
        }
        node.children = children;
    }
}

/// Make `expanded_nodes` the given set (restricted to present nodes) and
/// mirror it onto each node's flag.
fn sync_expanded(graph: &mut ObjectGraph, expanded: Vec<NodeId>) {
    graph.expanded_nodes = expanded.into_iter().filter(|id| graph.nodes.contains_key(id)).collect();
    for (id, node) in graph.nodes.iter_mut() {
        node.expanded = graph.expanded_nodes.contains(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Connection;
    use serde_json::json;

    fn id(s: &str) -> NodeId {
        NodeId::from(s)
    }

    fn sample() -> ObjectGraph {
        let g = ObjectGraph::with_root(ObjectNode::new("World", "setting").with_id("w"));
        let g = g.add_node(ObjectNode::new("Port", "location").with_id("p"), Some(&id("w"))).unwrap();
        let g = g.add_node(ObjectNode::new("Anne", "character").with_id("a"), Some(&id("p"))).unwrap();
        g.add_connection(&id("a"), Connection::new("p", "lives_in"))
            .expand(&id("w"))
            .record_generation(ObjectGenerationRecord::new(id("w"), "places").with_generated(vec![id("p")]))
    }

    #[test]
    fn round_trip_into_empty_graph() {
        let original = sample();
        let text = serde_json::to_string(&export(&original)).unwrap();
        let doc: ObjectData = serde_json::from_str(&text).unwrap();
        let imported = import(&ObjectGraph::new(), doc, ImportMode::Replace).unwrap();
        assert_eq!(imported, original);
    }

    #[test]
    fn export_uses_camel_case_keys() {
        let value = serde_json::to_value(export(&sample())).unwrap();
        assert_eq!(value["rootNodeId"], json!("w"));
        assert_eq!(value["expandedNodes"], json!(["w"]));
        assert!(value["generationHistory"][0].get("parentNodeId").is_some());
    }

    #[test]
    fn replace_rejects_missing_root() {
        let mut doc = export(&sample());
        doc.root_node_id = Some(id("nope"));
        assert!(matches!(
            import(&ObjectGraph::new(), doc, ImportMode::Replace),
            Err(ArborError::Precondition(_))
        ));

        let mut doc = export(&sample());
        doc.root_node_id = None;
        assert!(import(&ObjectGraph::new(), doc, ImportMode::Replace).is_err());
    }

    #[test]
    fn replace_rejects_orphans() {
        let mut doc = export(&sample());
        doc.nodes.insert(id("x"), ObjectNode::new("X", "thing").with_id("x"));
        assert!(import(&ObjectGraph::new(), doc, ImportMode::Replace).is_err());
    }

    #[test]
    fn expanded_flags_follow_document() {
        let mut doc = export(&sample());
        doc.expanded_nodes = vec![id("p"), id("ghost")];
        let g = import(&ObjectGraph::new(), doc, ImportMode::Replace).unwrap();
        assert_eq!(g.expanded_nodes().iter().cloned().collect::<Vec<_>>(), vec![id("p")]);
        assert!(g.node(&id("p")).unwrap().expanded);
        assert!(!g.node(&id("w")).unwrap().expanded);
    }

    #[test]
    fn merge_grafts_foreign_root() {
        let other = ObjectGraph::with_root(ObjectNode::new("Moon", "setting").with_id("m"));
        let other = other
            .add_node(ObjectNode::new("Crater", "location").with_id("c"), Some(&id("m")))
            .unwrap()
            .expand(&id("m"));

        let merged = import(&sample(), export(&other), ImportMode::Merge).unwrap();
        assert_eq!(merged.root_node_id(), Some(&id("w")));
        assert_eq!(merged.node(&id("w")).unwrap().children, vec![id("p"), id("m")]);
        assert_eq!(merged.node(&id("m")).unwrap().parent_id, Some(id("w")));
        assert!(merged.is_expanded(&id("w")));
        assert!(merged.is_expanded(&id("m")));
        assert_eq!(merged.node_count(), 5);
    }

    #[test]
    fn merge_overwrites_by_id_and_dedupes_history() {
        let base = sample();
        let mut doc = export(&base);
        if let Some(anne) = doc.nodes.get_mut(&id("a")) {
            anne.name = "Anne Bonny".into();
        }
        let merged = import(&base, doc, ImportMode::Merge).unwrap();
        assert_eq!(merged.node(&id("a")).unwrap().name, "Anne Bonny");
        assert_eq!(merged.node_count(), base.node_count());
        assert_eq!(merged.generation_history().len(), 1);
    }

    #[test]
    fn merge_into_empty_is_replace() {
        let original = sample();
        let merged = import(&ObjectGraph::new(), export(&original), ImportMode::Merge).unwrap();
        assert_eq!(merged, original);
    }
}
