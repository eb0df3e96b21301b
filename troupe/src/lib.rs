//! Superstep graph orchestration for cooperating LLM agents.
//!
//! This crate re-exports the workspace behind cargo features:
//!
//! | feature     | crate                      |
//! |-------------|----------------------------|
//! | (always)    | `troupe-core` as [`core`]  |
//! | `graph`     | `troupe-graph` as [`graph`] |
//! | `derive`    | `#[derive(StateSchema)]`   |
//! | `sqlite`    | `troupe-checkpoint-sqlite` as [`sqlite`] |
//! | `pipelines` | `troupe-pipelines` as [`pipelines`] |

pub use troupe_core as core;

#[cfg(feature = "graph")]
pub use troupe_graph as graph;

#[cfg(feature = "sqlite")]
pub use troupe_checkpoint_sqlite as sqlite;

#[cfg(feature = "pipelines")]
pub use troupe_pipelines as pipelines;

pub mod prelude {
    pub use troupe_core::{
        Checkpointer, Decision, GraphState, InMemoryCheckpointer, StateSchema, StateUpdate,
        TroupeError, FINISH,
    };

    #[cfg(feature = "graph")]
    pub use troupe_graph::{
        node_fn, CompiledGraph, ExecutionOptions, GraphBuilder, GraphError, GraphNode,
        RevisionBound, RunManager, Subgraph, SupervisorRoutes, END, START,
    };
}
