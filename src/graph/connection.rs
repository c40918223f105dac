//! Typed connections between object nodes

use super::node::{NodeId, NodeSource};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How strongly two nodes are related
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    Weak,
    #[default]
    Medium,
    Strong,
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Weak => "weak",
            Self::Medium => "medium",
            Self::Strong => "strong",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for Strength {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weak" => Ok(Self::Weak),
            "medium" => Ok(Self::Medium),
            "strong" => Ok(Self::Strong),
            _ => Err(format!("unknown connection strength: {}", s)),
        }
    }
}

/// Connection metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub source: NodeSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_prompt: Option<String>,
}

impl Default for ConnectionMetadata {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            source: NodeSource::User,
            ai_prompt: None,
        }
    }
}

/// A directed, typed edge from the owning node to `node_id`
///
/// Independent of the tree: any node may connect to any other. The target
/// is not validated; a connection whose target was deleted stays in place
/// and readers treat it as "target missing".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Target node
    pub node_id: NodeId,
    /// Type of relationship (e.g., "ally_of", "located_in")
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub strength: Strength,
    #[serde(default)]
    pub metadata: ConnectionMetadata,
}

impl Connection {
    /// Create a new user-authored connection of medium strength
    pub fn new(target: impl Into<NodeId>, role: impl Into<String>) -> Self {
        Self {
            node_id: target.into(),
            role: role.into(),
            description: None,
            strength: Strength::Medium,
            metadata: ConnectionMetadata::default(),
        }
    }

    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = strength;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the connection as AI-proposed from `prompt`
    pub fn generated_from(mut self, prompt: impl Into<String>) -> Self {
        self.metadata.source = NodeSource::Ai;
        self.metadata.ai_prompt = Some(prompt.into());
        self
    }
}
