//! Audit log of AI-assisted subtree creation

use super::node::NodeId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One AI generation request and the nodes it produced
///
/// Append-only. A cancelled request is still recorded, with no generated ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectGenerationRecord {
    pub id: String,
    pub parent_node_id: NodeId,
    pub prompt: String,
    #[serde(default)]
    pub generated_node_ids: Vec<NodeId>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
}

impl ObjectGenerationRecord {
    pub fn new(parent_node_id: NodeId, prompt: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parent_node_id,
            prompt: prompt.into(),
            generated_node_ids: Vec::new(),
            timestamp: Utc::now(),
            model_id: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_generated(mut self, ids: Vec<NodeId>) -> Self {
        self.generated_node_ids = ids;
        self
    }
}
