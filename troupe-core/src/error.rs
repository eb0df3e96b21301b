use std::{error::Error as StdError, time::Duration};

use thiserror::Error;

/// Error returned by node executors and the collaborators they call.
#[derive(Debug, Error)]
pub enum TroupeError {
    #[error("Collaborator '{name}' failed: {reason}")]
    Collaborator { name: String, reason: String },
    #[error("Parsing failed on output '{output}': {reason}")]
    ParseFailed { output: String, reason: String },
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("Checkpoint failed: {0}")]
    CheckpointFailed(String),
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Subgraph '{graph}' failed: {source}")]
    Subgraph {
        graph: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
    #[error("Serialization/deserialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Custom(String),
}

impl TroupeError {
    pub fn collaborator(name: impl Into<String>, reason: impl ToString) -> Self {
        TroupeError::Collaborator {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}
