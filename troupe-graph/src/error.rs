use thiserror::Error;
use troupe_core::TroupeError;

use crate::runs::RunStatus;

/// Reasons a graph definition is rejected by [`GraphBuilder::compile`].
///
/// [`GraphBuilder::compile`]: crate::GraphBuilder::compile
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphConfigError {
    #[error("node '{node}' is declared twice")]
    DuplicateNode { node: String },
    #[error("'{node}' is a reserved name")]
    ReservedName { node: String },
    #[error("graph has no entry node")]
    MissingEntry,
    #[error("entry set to both '{first}' and '{second}'")]
    ConflictingEntry { first: String, second: String },
    #[error("entry node '{node}' is not declared")]
    UnknownEntry { node: String },
    #[error("edge '{from}' -> '{to}' references an undeclared node")]
    UnknownEdgeEndpoint { from: String, to: String },
    #[error("conditional edge from '{node}' declares no targets")]
    EmptyConditionalTargets { node: String },
    #[error("node '{node}' mixes static, conditional or supervisor routing")]
    ConflictingEdges { node: String },
    #[error("node '{node}' is unreachable from the entry")]
    UnreachableNode { node: String },
    #[error("node '{node}' has no path to END")]
    NoPathToEnd { node: String },
    #[error("state key '{key}' is declared twice")]
    DuplicateStateKey { key: String },
    #[error("{context} references undeclared node '{node}'")]
    UnknownNode { node: String, context: &'static str },
    #[error("supervisor '{supervisor}' falls back to '{fallback}', which is not one of its targets")]
    FallbackNotTargeted { supervisor: String, fallback: String },
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error(transparent)]
    Config(#[from] GraphConfigError),
    #[error("node '{node}' routed to undeclared target '{target}'")]
    Routing { node: String, target: String },
    #[error("routing function of node '{node}' panicked: {message}")]
    RouterPanicked { node: String, message: String },
    #[error("node '{node}' failed: {source}")]
    NodeFailed {
        node: String,
        #[source]
        source: TroupeError,
    },
    #[error("checkpoint failed: {0}")]
    Checkpoint(String),
    #[error("run cancelled at superstep {step}")]
    Cancelled { step: u64 },
    #[error("max steps exceeded: limit {max}")]
    MaxStepsExceeded { max: usize },
    #[error("thread '{thread_id}' has no pending run to resume")]
    NothingToResume { thread_id: String },
    #[error("run '{0}' not found")]
    RunNotFound(String),
    #[error("run has not finished (status: {status:?})")]
    RunNotFinished { status: RunStatus },
    #[error("run failed: {message}")]
    RunFailed { message: String },
}

impl GraphError {
    /// Name of the node that caused the failure, when there is one.
    pub fn node(&self) -> Option<&str> {
        match self {
            GraphError::NodeFailed { node, .. }
            | GraphError::Routing { node, .. }
            | GraphError::RouterPanicked { node, .. } => Some(node),
            _ => None,
        }
    }
}
