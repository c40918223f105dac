//! Text search over object nodes

use crate::graph::{NodeId, ObjectGraph, ObjectNode};

/// Query for finding nodes by text, optionally narrowed by type
///
/// A linear scan: no index is maintained. Results follow tree pre-order
/// from the root, with unreachable nodes afterwards sorted by id.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// Case-insensitive substring matched against name and description.
    /// Empty matches every node.
    pub text: String,
    /// Filter by node type (exact match)
    pub node_type: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Filter by node type
    pub fn with_node_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    /// Limit results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Execute the query against a graph
    pub fn execute(&self, graph: &ObjectGraph) -> Vec<NodeId> {
        let needle = self.text.to_lowercase();
        let matches = graph
            .traversal_order()
            .into_iter()
            .filter(|node| self.matches(node, &needle))
            .map(|node| node.id.clone());

        match self.limit {
            Some(limit) => matches.take(limit).collect(),
            None => matches.collect(),
        }
    }

    fn matches(&self, node: &ObjectNode, needle: &str) -> bool {
        if let Some(ref expected_type) = self.node_type {
            if &node.node_type != expected_type {
                return false;
            }
        }
        node.matches_text(needle)
    }
}
