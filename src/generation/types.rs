//! Requests to and responses from the AI collaborator

use crate::graph::{NodeId, Properties, Strength};
use serde::{Deserialize, Serialize};

/// What the collaborator is asked to produce for a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationKind {
    Children,
    Description,
    Properties,
    Connections,
}

impl std::fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Children => "children",
            Self::Description => "description",
            Self::Properties => "properties",
            Self::Connections => "connections",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for GenerationKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "children" => Ok(Self::Children),
            "description" => Ok(Self::Description),
            "properties" => Ok(Self::Properties),
            "connections" => Ok(Self::Connections),
            _ => Err(format!("unknown generation kind: {}", s)),
        }
    }
}

/// One call to the collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub node_id: NodeId,
    pub kind: GenerationKind,
    /// Free-form user prompt
    pub prompt: String,
    /// Rendered context bundle for the node
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Upper bound on proposed children, for `Children` requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_children: Option<usize>,
}

/// A proposed child node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildProposal {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ChildProposal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            node_type: None,
            description: None,
        }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A proposed connection from the request's node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionProposal {
    /// Target node id, or a node name when the collaborator does not know ids
    pub target: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub strength: Strength,
}

impl ConnectionProposal {
    pub fn new(target: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            role: role.into(),
            description: None,
            strength: Strength::default(),
        }
    }

    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = strength;
        self
    }
}

/// The collaborator's answer, shaped by the request kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum GenerationResponse {
    Children(Vec<ChildProposal>),
    Description(String),
    Properties(Properties),
    Connections(Vec<ConnectionProposal>),
}

impl GenerationResponse {
    pub fn kind(&self) -> GenerationKind {
        match self {
            Self::Children(_) => GenerationKind::Children,
            Self::Description(_) => GenerationKind::Description,
            Self::Properties(_) => GenerationKind::Properties,
            Self::Connections(_) => GenerationKind::Connections,
        }
    }
}
