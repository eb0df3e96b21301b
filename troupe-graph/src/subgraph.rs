use std::sync::Arc;

use troupe_core::{GraphState, StateSchema, StateUpdate, TroupeError};

use crate::{CompiledGraph, GraphContext, GraphNode, NodeCapability};

type InputProjection<P, C> = Arc<dyn Fn(&P) -> C + Send + Sync>;
type OutputProjection<P, C> = Arc<dyn Fn(&C) -> StateUpdate<P> + Send + Sync>;

/// A compiled child graph embedded as one atomic node of a parent graph.
///
/// Only the projections cross the boundary: `input` builds the child's
/// initial state from the parent snapshot, `output` turns the child's final
/// state into the parent's partial update.
pub struct Subgraph<P: StateSchema, C: StateSchema> {
    name: String,
    graph: CompiledGraph<C>,
    input: InputProjection<P, C>,
    output: OutputProjection<P, C>,
}

impl<P: StateSchema, C: StateSchema> Subgraph<P, C> {
    pub fn new<I, O>(name: impl Into<String>, graph: CompiledGraph<C>, input: I, output: O) -> Self
    where
        I: Fn(&P) -> C + Send + Sync + 'static,
        O: Fn(&C) -> StateUpdate<P> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            graph,
            input: Arc::new(input),
            output: Arc::new(output),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait::async_trait]
impl<P: StateSchema, C: StateSchema> GraphNode<P> for Subgraph<P, C> {
    async fn invoke_with_context(
        &self,
        input: GraphState<P>,
        context: &GraphContext,
    ) -> Result<StateUpdate<P>, TroupeError> {
        let initial = GraphState::new((self.input)(&input.data));
        let thread_id = format!("{}/{}", context.run.thread_id, context.node_id);
        let finished = self
            .graph
            .invoke_nested(initial, thread_id, context.cancellation.clone())
            .await
            .map_err(|err| TroupeError::Subgraph {
                graph: self.name.clone(),
                source: Box::new(err),
            })?;
        Ok((self.output)(&finished.data))
    }

    fn capability(&self) -> NodeCapability {
        NodeCapability::Subgraph
    }
}
