//! Error types shared by the graph model, the generator boundary and the stores.

use crate::core::model::{ChoiceId, NodeId};
use thiserror::Error;

/// Rejection of a story loaded from an untrusted source.
#[derive(Debug, Error)]
pub enum StoryError {
    #[error("Invalid story: root node {0} is missing")]
    MissingRoot(NodeId),

    #[error("Invalid story: choice {choice_id} on node {node_id} points at missing node {target}")]
    DanglingChoice {
        node_id: NodeId,
        choice_id: ChoiceId,
        target: NodeId,
    },

    #[error("Invalid story JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read story: {0}")]
    Io(String),
}

/// Failure of a generation request or of committing its result.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("Unknown choice {choice_id} on node {node_id}")]
    UnknownChoice {
        node_id: NodeId,
        choice_id: ChoiceId,
    },

    #[error("Direction must not be empty")]
    EmptyDirection,

    #[error("Seed must not be empty")]
    EmptySeed,

    #[error("Generation failed: {0}")]
    Provider(String),

    #[error("Malformed generation response: {0}")]
    Malformed(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl GenerateError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerateError::Cancelled)
    }
}

/// Failure reported by a remote story store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Remote store not configured")]
    Unavailable,

    #[error("Story not found: {0}")]
    NotFound(String),

    #[error("Remote store error: {0}")]
    Remote(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] StoryError),
}
