//! Superstep graph engine.
//!
//! A graph is declared with [`GraphBuilder`], validated once by
//! [`GraphBuilder::compile`], and executed by [`CompiledGraph`] in rounds:
//! every active node runs concurrently against the same snapshot, the
//! partial updates are merged through the state's reducers in declaration
//! order, then the outgoing edges pick the next active set.

mod builder;
mod config;
mod error;
mod executor;
mod file_checkpointer;
mod node;
mod observer;
mod program;
mod revision;
mod router;
mod runs;
mod subgraph;
mod supervisor;

/// Alias of the entry node when declaring edges.
pub const START: &str = "__start__";
/// Terminal sentinel of static and conditional edges.
pub const END: &str = "__end__";

pub use builder::GraphBuilder;
pub use config::{ExecutionConfig, ExecutionOptions};
pub use error::{GraphConfigError, GraphError};
pub use executor::CompiledGraph;
pub use file_checkpointer::{CheckpointRecord, FileCheckpointer};
pub use node::{node_fn, FnNode, GraphContext, GraphNode, NodeCapability, RunContext};
pub use observer::Observer;
pub use program::{EdgeDescription, EdgeKind, GraphDescription, NodeDescription};
pub use revision::RevisionBound;
pub use router::Targets;
pub use runs::{RunHandle, RunManager, RunStatus};
pub use subgraph::Subgraph;
pub use supervisor::{SupervisorNode, SupervisorOutput, SupervisorRoutes};

pub use troupe_core::{
    Checkpoint, CheckpointMetadata, Checkpointer, Decision, GraphState, HistoryCheckpointer,
    InMemoryCheckpointer, StateSchema, StateUpdate, TroupeError, FINISH,
};
