//! Read-only context assembly for prompt building
//!
//! Everything here is a pure derivation over one graph snapshot. Identical
//! snapshots render byte-identical bundles.

use crate::graph::{Connection, NodeId, ObjectGraph, ObjectNode};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::{self, Write as _};

/// A connection joined to its target; `target` is `None` when dangling
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConnection<'a> {
    pub connection: &'a Connection,
    pub target: Option<&'a ObjectNode>,
}

/// Everything the AI collaborator sees about one node
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle<'a> {
    pub node: &'a ObjectNode,
    /// Root first, excluding `node`
    pub ancestors: Vec<&'a ObjectNode>,
    pub siblings: Vec<&'a ObjectNode>,
    pub children: Vec<&'a ObjectNode>,
    pub connections: Vec<ResolvedConnection<'a>>,
}

/// Derives prompt context from an [`ObjectGraph`]
#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler<'a> {
    graph: &'a ObjectGraph,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(graph: &'a ObjectGraph) -> Self {
        Self { graph }
    }

    /// Root-to-node path including the node itself. Empty if the node is missing.
    ///
    /// Stops at the first missing parent or repeated id.
    pub fn ancestor_chain(&self, id: &NodeId) -> Vec<&'a ObjectNode> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self.graph.node(id);
        while let Some(node) = current {
            if !seen.insert(&node.id) {
                break;
            }
            chain.push(node);
            current = node.parent_id.as_ref().and_then(|p| self.graph.node(p));
        }
        chain.reverse();
        chain
    }

    /// The parent's other children, in child order. Empty for the root.
    pub fn siblings(&self, id: &NodeId) -> Vec<&'a ObjectNode> {
        let parent = self
            .graph
            .node(id)
            .and_then(|n| n.parent_id.as_ref())
            .and_then(|p| self.graph.node(p));
        match parent {
            Some(parent) => parent
                .children
                .iter()
                .filter(|c| *c != id)
                .filter_map(|c| self.graph.node(c))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn direct_children(&self, id: &NodeId) -> Vec<&'a ObjectNode> {
        self.graph
            .node(id)
            .map(|n| n.children.iter().filter_map(|c| self.graph.node(c)).collect())
            .unwrap_or_default()
    }

    pub fn resolved_connections(&self, id: &NodeId) -> Vec<ResolvedConnection<'a>> {
        self.graph
            .node(id)
            .map(|n| {
                n.connections
                    .iter()
                    .map(|connection| ResolvedConnection {
                        connection,
                        target: self.graph.node(&connection.node_id),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Compose the full bundle, or `None` if the node is missing
    pub fn full_context_bundle(&self, id: &NodeId) -> Option<ContextBundle<'a>> {
        let node = self.graph.node(id)?;
        let mut ancestors = self.ancestor_chain(id);
        ancestors.pop();
        Some(ContextBundle {
            node,
            ancestors,
            siblings: self.siblings(id),
            children: self.direct_children(id),
            connections: self.resolved_connections(id),
        })
    }
}

impl ContextBundle<'_> {
    /// Render as prompt text
    pub fn render(&self) -> String {
        let mut out = String::new();
        if self.write_to(&mut out).is_err() {
            out.clear();
        }
        out
    }

    fn write_to(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "# Context for {}", label(self.node))?;

        writeln!(out, "\n## Hierarchy")?;
        for (depth, ancestor) in self.ancestors.iter().enumerate() {
            writeln!(out, "{}{}", "  ".repeat(depth), label(ancestor))?;
        }
        writeln!(out, "{}> {}", "  ".repeat(self.ancestors.len()), label(self.node))?;

        if !self.ancestors.is_empty() {
            writeln!(out, "\n## Ancestors")?;
            for ancestor in &self.ancestors {
                write_details(out, ancestor)?;
            }
        }

        writeln!(out, "\n## Current node")?;
        write_details(out, self.node)?;

        writeln!(out, "\n## Siblings")?;
        write_summaries(out, &self.siblings)?;

        writeln!(out, "\n## Children")?;
        write_summaries(out, &self.children)?;

        writeln!(out, "\n## Connections")?;
        if self.connections.is_empty() {
            writeln!(out, "(none)")?;
        }
        for resolved in &self.connections {
            let c = resolved.connection;
            match resolved.target {
                Some(target) => write!(out, "- {} -> {} [{}]", c.role, label(target), c.strength)?,
                None => write!(out, "- {} -> node not found ({}) [{}]", c.role, c.node_id, c.strength)?,
            }
            match &c.description {
                Some(d) => writeln!(out, ": {}", d)?,
                None => writeln!(out)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for ContextBundle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn label(node: &ObjectNode) -> String {
    format!("{} ({})", node.name, node.node_type)
}

fn write_details(out: &mut String, node: &ObjectNode) -> fmt::Result {
    writeln!(out, "### {}", label(node))?;
    if let Some(description) = &node.description {
        writeln!(out, "{}", description)?;
    }
    for (key, value) in &node.properties {
        writeln!(out, "- {}: {}", key, value)?;
    }
    Ok(())
}

fn write_summaries(out: &mut String, nodes: &[&ObjectNode]) -> fmt::Result {
    if nodes.is_empty() {
        return writeln!(out, "(none)");
    }
    for node in nodes {
        match &node.description {
            Some(d) => writeln!(out, "- {}: {}", label(node), d)?,
            None => writeln!(out, "- {}", label(node))?,
        }
    }
    Ok(())
}
