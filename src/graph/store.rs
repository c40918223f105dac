//! ObjectGraph: the node tree of one object page plus its connections
//!
//! Transitions take `&self` and return a new graph. A transition naming a
//! node that does not exist returns an unchanged copy; only cycle rejections
//! and malformed input produce errors.

use super::connection::Connection;
use super::history::ObjectGenerationRecord;
use super::node::{NodeId, NodeUpdate, ObjectNode, PropertyValue};
use crate::error::{ArborError, ArborResult};
use crate::query::SearchQuery;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// A tree of object nodes with superimposed connections
///
/// `expanded_nodes` is authoritative for expansion state; each node's
/// `expanded` flag mirrors it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectGraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) root_node_id: Option<NodeId>,
    #[serde(default)]
    pub(crate) nodes: HashMap<NodeId, ObjectNode>,
    #[serde(default)]
    pub(crate) expanded_nodes: BTreeSet<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) selected_node_id: Option<NodeId>,
    #[serde(default)]
    pub(crate) generation_history: Vec<ObjectGenerationRecord>,
}

/// A connection whose target no longer exists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingConnection {
    pub source: NodeId,
    pub index: usize,
    pub target: NodeId,
}

/// A structural inconsistency found by [`ObjectGraph::check_integrity`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// `root_node_id` names a node that is not in the graph
    MissingRoot(NodeId),
    /// A node's `parent_id` names a node that is not in the graph
    MissingParent { node: NodeId, parent: NodeId },
    /// A node's parent does not list it among its children
    NotListedByParent { node: NodeId, parent: NodeId },
    /// A `children` entry names a node that is not in the graph
    MissingChild { parent: NodeId, child: NodeId },
    /// A `children` entry names a node whose `parent_id` points elsewhere
    ParentMismatch { parent: NodeId, child: NodeId },
    /// Not reachable from the root (orphaned or part of a cycle)
    Unreachable(NodeId),
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRoot(id) => write!(f, "root {} is missing", id),
            Self::MissingParent { node, parent } => write!(f, "{} names missing parent {}", node, parent),
            Self::NotListedByParent { node, parent } => write!(f, "{} is not listed by parent {}", node, parent),
            Self::MissingChild { parent, child } => write!(f, "{} lists missing child {}", parent, child),
            Self::ParentMismatch { parent, child } => write!(f, "{} lists {} whose parent is elsewhere", parent, child),
            Self::Unreachable(id) => write!(f, "{} is unreachable from the root", id),
        }
    }
}

impl ObjectGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a graph whose root is `root`
    pub fn with_root(mut root: ObjectNode) -> Self {
        root.parent_id = None;
        root.children.clear();
        let mut graph = Self {
            root_node_id: Some(root.id.clone()),
            ..Self::default()
        };
        if root.expanded {
            graph.expanded_nodes.insert(root.id.clone());
        }
        graph.nodes.insert(root.id.clone(), root);
        graph
    }

    // === Reads ===

    pub fn root_node_id(&self) -> Option<&NodeId> {
        self.root_node_id.as_ref()
    }

    pub fn root(&self) -> Option<&ObjectNode> {
        self.root_node_id.as_ref().and_then(|id| self.nodes.get(id))
    }

    /// Get a node by ID
    pub fn node(&self, id: &NodeId) -> Option<&ObjectNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Get all nodes (unordered)
    pub fn nodes(&self) -> impl Iterator<Item = &ObjectNode> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn expanded_nodes(&self) -> &BTreeSet<NodeId> {
        &self.expanded_nodes
    }

    pub fn is_expanded(&self, id: &NodeId) -> bool {
        self.expanded_nodes.contains(id)
    }

    pub fn selected_node_id(&self) -> Option<&NodeId> {
        self.selected_node_id.as_ref()
    }

    pub fn generation_history(&self) -> &[ObjectGenerationRecord] {
        &self.generation_history
    }

    /// The node and all of its descendants, pre-order. Empty if `id` is missing.
    pub fn subtree(&self, id: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.nodes.contains_key(id) {
            return out;
        }
        let mut seen = HashSet::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            if !seen.insert(current.clone()) {
                continue;
            }
            stack.extend(node.children.iter().rev().cloned());
            out.push(current);
        }
        out
    }

    /// Every node, root subtree first in pre-order, then nodes unreachable
    /// from the root sorted by id.
    pub fn traversal_order(&self) -> Vec<&ObjectNode> {
        let reachable = self
            .root_node_id
            .as_ref()
            .map(|root| self.subtree(root))
            .unwrap_or_default();
        let seen: HashSet<&NodeId> = reachable.iter().collect();

        let mut rest: Vec<&ObjectNode> = self.nodes.values().filter(|n| !seen.contains(&n.id)).collect();
        rest.sort_by(|a, b| a.id.cmp(&b.id));

        reachable
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .chain(rest)
            .collect()
    }

    /// True if `candidate` is `ancestor` or sits somewhere below it.
    ///
    /// Walks the `parent_id` chain of `candidate`; O(depth).
    pub fn is_within(&self, candidate: &NodeId, ancestor: &NodeId) -> bool {
        let mut current = Some(candidate);
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.nodes.len() {
                break;
            }
            current = self.nodes.get(id).and_then(|n| n.parent_id.as_ref());
        }
        false
    }

    /// Case-insensitive substring search over names and descriptions
    pub fn search(&self, query: &str) -> Vec<NodeId> {
        SearchQuery::new(query).execute(self)
    }

    /// Connections whose target is missing, in traversal order
    pub fn dangling_connections(&self) -> Vec<DanglingConnection> {
        self.traversal_order()
            .into_iter()
            .flat_map(|node| {
                node.connections
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| !self.nodes.contains_key(&c.node_id))
                    .map(|(index, c)| DanglingConnection {
                        source: node.id.clone(),
                        index,
                        target: c.node_id.clone(),
                    })
            })
            .collect()
    }

    /// Report every violation of the tree invariants
    pub fn check_integrity(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();
        if let Some(root) = &self.root_node_id {
            if !self.nodes.contains_key(root) {
                issues.push(IntegrityIssue::MissingRoot(root.clone()));
            }
        }

        let mut ids: Vec<&NodeId> = self.nodes.keys().collect();
        ids.sort();
        for id in &ids {
            let node = &self.nodes[*id];
            if let Some(parent_id) = &node.parent_id {
                match self.nodes.get(parent_id) {
                    None => issues.push(IntegrityIssue::MissingParent {
                        node: node.id.clone(),
                        parent: parent_id.clone(),
                    }),
                    Some(parent) if !parent.children.contains(&node.id) => {
                        issues.push(IntegrityIssue::NotListedByParent {
                            node: node.id.clone(),
                            parent: parent_id.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
            for child in &node.children {
                match self.nodes.get(child) {
                    None => issues.push(IntegrityIssue::MissingChild {
                        parent: node.id.clone(),
                        child: child.clone(),
                    }),
                    Some(c) if c.parent_id.as_ref() != Some(&node.id) => {
                        issues.push(IntegrityIssue::ParentMismatch {
                            parent: node.id.clone(),
                            child: child.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        let reachable: HashSet<NodeId> = self
            .root_node_id
            .as_ref()
            .map(|root| self.subtree(root).into_iter().collect())
            .unwrap_or_default();
        for id in ids {
            if !reachable.contains(id) {
                issues.push(IntegrityIssue::Unreachable(id.clone()));
            }
        }
        issues
    }

    // === Transitions ===

    /// Insert `node` under `parent`, appending it to the parent's children.
    ///
    /// Without a parent the node becomes the root, which is only allowed when
    /// the graph has none. Duplicate ids and a second root are precondition
    /// violations; a missing parent leaves the graph unchanged. Any children
    /// listed on the incoming node are dropped.
    pub fn add_node(&self, node: ObjectNode, parent: Option<&NodeId>) -> ArborResult<Self> {
        let mut next = self.clone();
        next.insert_node(node, parent)?;
        Ok(next)
    }

    /// Shallow-merge `update` into the node and stamp `updated_at`
    pub fn update_node(&self, id: &NodeId, update: NodeUpdate) -> Self {
        let mut next = self.clone();
        if let Some(node) = next.nodes.get_mut(id) {
            update.apply_to(node);
            node.metadata.updated_at = Some(Utc::now());
        }
        next
    }

    /// Remove the node and its whole subtree.
    ///
    /// Selection and expansion entries for removed nodes are cleared.
    /// Connections from surviving nodes into the removed subtree are kept
    /// and become dangling.
    pub fn delete_node(&self, id: &NodeId) -> Self {
        let mut next = self.clone();
        next.remove_subtree(id);
        next
    }

    /// Remove every descendant of the node, leaving it with no children
    pub fn clear_children(&self, id: &NodeId) -> Self {
        let Some(node) = self.nodes.get(id) else {
            return self.clone();
        };
        let children = node.children.clone();
        let mut next = self.clone();
        for child in &children {
            next.remove_subtree(child);
        }
        if let Some(node) = next.nodes.get_mut(id) {
            node.children.clear();
        }
        next
    }

    /// Reparent `id` under `new_parent` at `index` (end when `None`).
    ///
    /// The ancestor chain of `new_parent` is walked first; finding `id` on
    /// it rejects the move with `CycleDetected`. The root cannot be moved.
    pub fn move_node(&self, id: &NodeId, new_parent: &NodeId, index: Option<usize>) -> ArborResult<Self> {
        if !self.contains(id) || !self.contains(new_parent) {
            return Ok(self.clone());
        }
        if self.is_within(new_parent, id) {
            return Err(ArborError::cycle(id, new_parent));
        }
        if self.root_node_id.as_ref() == Some(id) {
            return Err(ArborError::precondition("the root node cannot be reparented"));
        }

        let mut next = self.clone();
        let old_parent = next.nodes.get(id).and_then(|n| n.parent_id.clone());
        if let Some(old) = old_parent.and_then(|p| next.nodes.get_mut(&p)) {
            old.children.retain(|c| c != id);
        }
        if let Some(parent) = next.nodes.get_mut(new_parent) {
            let at = index.unwrap_or(parent.children.len()).min(parent.children.len());
            parent.children.insert(at, id.clone());
        }
        if let Some(node) = next.nodes.get_mut(id) {
            node.parent_id = Some(new_parent.clone());
        }
        debug!(node = %id, parent = %new_parent, "moved node");
        Ok(next)
    }

    /// Reorder a node's children to follow `ordered`; unlisted children keep
    /// their relative order after the listed ones. Ids that are not children
    /// are ignored.
    pub fn reorder_children(&self, parent: &NodeId, ordered: &[NodeId]) -> Self {
        let mut next = self.clone();
        if let Some(node) = next.nodes.get_mut(parent) {
            let mut sequence: Vec<NodeId> = Vec::with_capacity(node.children.len());
            for id in ordered {
                if node.children.contains(id) && !sequence.contains(id) {
                    sequence.push(id.clone());
                }
            }
            for id in &node.children {
                if !sequence.contains(id) {
                    sequence.push(id.clone());
                }
            }
            node.children = sequence;
        }
        next
    }

    pub fn toggle_expansion(&self, id: &NodeId) -> Self {
        let expanded = self.is_expanded(id);
        self.with_expanded(id, !expanded)
    }

    /// Idempotent
    pub fn expand(&self, id: &NodeId) -> Self {
        self.with_expanded(id, true)
    }

    /// Idempotent
    pub fn collapse(&self, id: &NodeId) -> Self {
        self.with_expanded(id, false)
    }

    /// Select a node, or clear the selection with `None`.
    /// Selecting a missing node is a no-op.
    pub fn select(&self, id: Option<&NodeId>) -> Self {
        let mut next = self.clone();
        match id {
            Some(id) if !self.nodes.contains_key(id) => {}
            _ => next.selected_node_id = id.cloned(),
        }
        next
    }

    /// Append a connection to the source node. The target is not validated.
    pub fn add_connection(&self, node_id: &NodeId, connection: Connection) -> Self {
        self.edit_node(node_id, |node| node.connections.push(connection))
    }

    /// Replace the connection at `index`; out-of-range is a no-op
    pub fn update_connection(&self, node_id: &NodeId, index: usize, connection: Connection) -> Self {
        match self.nodes.get(node_id) {
            Some(node) if index < node.connections.len() => {
                self.edit_node(node_id, |node| node.connections[index] = connection)
            }
            _ => self.clone(),
        }
    }

    /// Remove the connection at `index`; out-of-range is a no-op
    pub fn remove_connection(&self, node_id: &NodeId, index: usize) -> Self {
        match self.nodes.get(node_id) {
            Some(node) if index < node.connections.len() => self.edit_node(node_id, |node| {
                node.connections.remove(index);
            }),
            _ => self.clone(),
        }
    }

    pub fn set_property(&self, node_id: &NodeId, key: impl Into<String>, value: PropertyValue) -> Self {
        let key = key.into();
        self.edit_node(node_id, |node| {
            node.properties.insert(key, value);
        })
    }

    pub fn remove_property(&self, node_id: &NodeId, key: &str) -> Self {
        match self.nodes.get(node_id) {
            Some(node) if node.properties.contains_key(key) => self.edit_node(node_id, |node| {
                node.properties.remove(key);
            }),
            _ => self.clone(),
        }
    }

    /// Append to the generation audit log
    pub fn record_generation(&self, record: ObjectGenerationRecord) -> Self {
        let mut next = self.clone();
        next.generation_history.push(record);
        next
    }

    /// Drop every connection whose target is missing.
    ///
    /// Never run implicitly; deletes leave dangling connections in place.
    pub fn prune_dangling_connections(&self) -> (Self, usize) {
        let mut next = self.clone();
        let live: HashSet<NodeId> = self.nodes.keys().cloned().collect();
        let mut pruned = 0;
        for node in next.nodes.values_mut() {
            let before = node.connections.len();
            node.connections.retain(|c| live.contains(&c.node_id));
            pruned += before - node.connections.len();
        }
        if pruned > 0 {
            warn!(pruned, "pruned dangling connections");
        }
        (next, pruned)
    }

    // === Internal helpers (operate on a private copy) ===

    pub(crate) fn insert_node(&mut self, mut node: ObjectNode, parent: Option<&NodeId>) -> ArborResult<bool> {
        if self.nodes.contains_key(&node.id) {
            return Err(ArborError::precondition(format!("node {} already exists", node.id)));
        }
        node.children.clear();
        match parent {
            None => {
                if let Some(root) = &self.root_node_id {
                    return Err(ArborError::precondition(format!(
                        "graph already has root {}; new nodes need a parent",
                        root
                    )));
                }
                node.parent_id = None;
                self.root_node_id = Some(node.id.clone());
            }
            Some(parent_id) => {
                let Some(parent) = self.nodes.get_mut(parent_id) else {
                    return Ok(false);
                };
                parent.children.push(node.id.clone());
                node.parent_id = Some(parent_id.clone());
            }
        }
        if node.expanded {
            self.expanded_nodes.insert(node.id.clone());
        }
        debug!(node = %node.id, parent = ?parent, "added node");
        self.nodes.insert(node.id.clone(), node);
        Ok(true)
    }

    fn remove_subtree(&mut self, id: &NodeId) -> Vec<NodeId> {
        let removed = self.subtree(id);
        if removed.is_empty() {
            return removed;
        }
        let parent_id = self.nodes.get(id).and_then(|n| n.parent_id.clone());
        if let Some(parent) = parent_id.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| c != id);
        }
        for gone in &removed {
            self.nodes.remove(gone);
            self.expanded_nodes.remove(gone);
        }
        if self.selected_node_id.as_ref().is_some_and(|s| removed.contains(s)) {
            self.selected_node_id = None;
        }
        if self.root_node_id.as_ref().is_some_and(|r| removed.contains(r)) {
            self.root_node_id = None;
        }
        debug!(node = %id, removed = removed.len(), "deleted subtree");
        removed
    }

    fn with_expanded(&self, id: &NodeId, expanded: bool) -> Self {
        let mut next = self.clone();
        if let Some(node) = next.nodes.get_mut(id) {
            node.expanded = expanded;
            if expanded {
                next.expanded_nodes.insert(id.clone());
            } else {
                next.expanded_nodes.remove(id);
            }
        }
        next
    }

    /// Apply `edit` to a node and stamp `updated_at`; no-op if missing
    fn edit_node(&self, id: &NodeId, edit: impl FnOnce(&mut ObjectNode)) -> Self {
        let mut next = self.clone();
        if let Some(node) = next.nodes.get_mut(id) {
            edit(node);
            node.metadata.updated_at = Some(Utc::now());
        }
        next
    }
}
