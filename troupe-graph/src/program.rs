use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use troupe_core::{Decision, GraphState, StateSchema, StateUpdate, TroupeError};

use crate::router::RouterFn;
use crate::supervisor::{Guards, SupervisorNode, SupervisorRoutes};
use crate::{GraphContext, GraphNode, NodeCapability};

pub(crate) enum Executor<S: StateSchema> {
    Node(Arc<dyn GraphNode<S>>),
    Supervisor(Arc<dyn SupervisorNode<S>>),
}

impl<S: StateSchema> Clone for Executor<S> {
    fn clone(&self) -> Self {
        match self {
            Executor::Node(node) => Executor::Node(node.clone()),
            Executor::Supervisor(node) => Executor::Supervisor(node.clone()),
        }
    }
}

pub(crate) struct NodeOutput<S: StateSchema> {
    pub update: StateUpdate<S>,
    pub decision: Option<Decision>,
}

impl<S: StateSchema> Executor<S> {
    pub fn capability(&self) -> NodeCapability {
        match self {
            Executor::Node(node) => node.capability(),
            Executor::Supervisor(_) => NodeCapability::Supervisor,
        }
    }

    pub async fn run(
        &self,
        input: GraphState<S>,
        context: &GraphContext,
    ) -> Result<NodeOutput<S>, TroupeError> {
        match self {
            Executor::Node(node) => {
                let update = node.invoke_with_context(input, context).await?;
                Ok(NodeOutput {
                    update,
                    decision: None,
                })
            }
            Executor::Supervisor(node) => {
                let output = node.decide(input, context).await?;
                Ok(NodeOutput {
                    update: output.update,
                    decision: Some(output.decision),
                })
            }
        }
    }
}

pub(crate) enum Routing<S: StateSchema> {
    Static(Vec<String>),
    Conditional {
        targets: Vec<String>,
        router: RouterFn<S>,
    },
    Supervisor(SupervisorRoutes),
}

pub(crate) struct PlanNode<S: StateSchema> {
    pub name: String,
    pub executor: Executor<S>,
    pub routing: Routing<S>,
    pub timeout: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Static,
    Conditional,
    Decision,
}

/// Immutable compiled plan. Nodes are kept in declaration order, which is
/// also the merge order of a superstep.
pub(crate) struct GraphProgram<S: StateSchema> {
    pub graph: DiGraph<String, EdgeKind>,
    pub nodes: Vec<PlanNode<S>>,
    pub positions: AHashMap<String, usize>,
    pub entry: String,
    pub guards: Guards<S>,
}

impl<S: StateSchema> GraphProgram<S> {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|node| node.name.clone()).collect()
    }

    pub fn edge_names(&self) -> Vec<(String, String)> {
        self.graph
            .edge_references()
            .filter_map(|edge| {
                let from = self.graph.node_weight(edge.source())?;
                let to = self.graph.node_weight(edge.target())?;
                Some((from.clone(), to.clone()))
            })
            .collect()
    }

    pub fn describe(&self) -> GraphDescription {
        let nodes = self
            .nodes
            .iter()
            .map(|node| NodeDescription {
                name: node.name.clone(),
                capability: node.executor.capability(),
                timeout_ms: node.timeout.map(|t| t.as_millis() as u64),
            })
            .collect();
        let edges = self
            .graph
            .edge_references()
            .map(|edge| EdgeDescription {
                from: self.graph[edge.source()].clone(),
                to: self.graph[edge.target()].clone(),
                kind: *edge.weight(),
            })
            .collect();
        GraphDescription {
            entry: self.entry.clone(),
            nodes,
            edges,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub name: String,
    pub capability: NodeCapability,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeDescription {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

/// Graph definition as data, without any executor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphDescription {
    pub entry: String,
    pub nodes: Vec<NodeDescription>,
    pub edges: Vec<EdgeDescription>,
}

pub(crate) fn index_of(index: &AHashMap<String, NodeIndex>, name: &str) -> Option<NodeIndex> {
    index.get(name).copied()
}
