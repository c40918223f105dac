//! Error types shared across the workspace graph

use crate::generation::GenerationError;
use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur in Arbor operations
///
/// Missing ids are not errors: transitions that reference an absent item
/// leave the snapshot unchanged. Only cycle rejections, precondition
/// violations (malformed input) and collaborator failures surface here.
#[derive(Debug, Error)]
pub enum ArborError {
    #[error("moving {item} under {target} would create a cycle")]
    CycleDetected { item: String, target: String },

    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("Workspace not found: {0}")]
    WorkspaceNotFound(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),
}

impl ArborError {
    pub(crate) fn cycle(item: impl std::fmt::Display, target: impl std::fmt::Display) -> Self {
        Self::CycleDetected {
            item: item.to_string(),
            target: target.to_string(),
        }
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}

/// Result type for Arbor operations
pub type ArborResult<T> = Result<T, ArborError>;
