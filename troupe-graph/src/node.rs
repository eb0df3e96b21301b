use std::future::Future;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use troupe_core::{GraphState, StateSchema, StateUpdate, TroupeError};

/// What a node does when it runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCapability {
    /// Calls external collaborators directly.
    Leaf,
    /// Runs a nested compiled graph to completion.
    Subgraph,
    /// Emits a routing decision.
    Supervisor,
}

/// Identity of one execution attempt on a thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub thread_id: String,
    pub run_id: String,
    /// Index of the superstep currently executing.
    pub step: u64,
}

/// Handed to a node for the duration of one invocation.
#[derive(Clone, Debug)]
pub struct GraphContext {
    pub node_id: String,
    pub run: RunContext,
    pub cancellation: CancellationToken,
}

/// Executor contract: read-only snapshot in, partial update out.
#[async_trait::async_trait]
pub trait GraphNode<S: StateSchema>: Send + Sync + 'static {
    async fn invoke_with_context(
        &self,
        input: GraphState<S>,
        context: &GraphContext,
    ) -> Result<StateUpdate<S>, TroupeError>;

    fn capability(&self) -> NodeCapability {
        NodeCapability::Leaf
    }
}

/// Adapts an async closure over the state snapshot into a [`GraphNode`].
pub struct FnNode<S, F> {
    func: F,
    _state: PhantomData<fn() -> S>,
}

pub fn node_fn<S, F, Fut>(func: F) -> FnNode<S, F>
where
    S: StateSchema,
    F: Fn(GraphState<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateUpdate<S>, TroupeError>> + Send + 'static,
{
    FnNode {
        func,
        _state: PhantomData,
    }
}

#[async_trait::async_trait]
impl<S, F, Fut> GraphNode<S> for FnNode<S, F>
where
    S: StateSchema,
    F: Fn(GraphState<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<StateUpdate<S>, TroupeError>> + Send + 'static,
{
    async fn invoke_with_context(
        &self,
        input: GraphState<S>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<S>, TroupeError> {
        (self.func)(input).await
    }
}
