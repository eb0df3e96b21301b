use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, Reversed};
use troupe_core::{Checkpointer, GraphState, StateSchema, FINISH};

use crate::program::{index_of, EdgeKind, Executor, GraphProgram, PlanNode, Routing};
use crate::router::{boxed_router, RouterFn, Targets};
use crate::supervisor::{GuardFn, Guards, SupervisorNode, SupervisorRoutes};
use crate::{CompiledGraph, ExecutionConfig, GraphConfigError, GraphNode, END, START};

struct NodeDecl<S: StateSchema> {
    name: String,
    executor: Executor<S>,
    routes: Option<SupervisorRoutes>,
}

struct ConditionalDecl<S: StateSchema> {
    from: String,
    targets: Vec<String>,
    router: RouterFn<S>,
}

/// Declares a graph. Nothing is validated until [`GraphBuilder::compile`].
pub struct GraphBuilder<S: StateSchema> {
    nodes: Vec<NodeDecl<S>>,
    edges: Vec<(String, String)>,
    conditional: Vec<ConditionalDecl<S>>,
    guards: Vec<(String, GuardFn<S>)>,
    timeouts: Vec<(String, Duration)>,
    entry: Option<String>,
    errors: Vec<GraphConfigError>,
    default_config: ExecutionConfig,
    checkpointer: Option<Arc<dyn Checkpointer<S>>>,
}

impl<S: StateSchema> Default for GraphBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

fn connect(
    graph: &mut DiGraph<String, EdgeKind>,
    index: &AHashMap<String, NodeIndex>,
    from: &str,
    to: &str,
    kind: EdgeKind,
) {
    if let (Some(a), Some(b)) = (index_of(index, from), index_of(index, to)) {
        graph.update_edge(a, b, kind);
    }
}

fn is_reserved(name: &str) -> bool {
    name == START || name == END || name == FINISH
}

impl<S: StateSchema> GraphBuilder<S> {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            conditional: Vec::new(),
            guards: Vec::new(),
            timeouts: Vec::new(),
            entry: None,
            errors: Vec::new(),
            default_config: ExecutionConfig::default(),
            checkpointer: None,
        }
    }

    fn declare(&mut self, name: &str, executor: Executor<S>, routes: Option<SupervisorRoutes>) {
        if is_reserved(name) {
            self.errors.push(GraphConfigError::ReservedName {
                node: name.to_string(),
            });
            return;
        }
        if self.nodes.iter().any(|node| node.name == name) {
            self.errors.push(GraphConfigError::DuplicateNode {
                node: name.to_string(),
            });
            return;
        }
        self.nodes.push(NodeDecl {
            name: name.to_string(),
            executor,
            routes,
        });
    }

    pub fn add_node<N>(mut self, name: &str, node: N) -> Self
    where
        N: GraphNode<S>,
    {
        self.declare(name, Executor::Node(Arc::new(node)), None);
        self
    }

    /// Adds a node whose decision is its routing. `routes` is the closed set
    /// of nodes it may name besides `FINISH`.
    pub fn add_supervisor<N>(mut self, name: &str, node: N, routes: SupervisorRoutes) -> Self
    where
        N: SupervisorNode<S>,
    {
        self.declare(name, Executor::Supervisor(Arc::new(node)), Some(routes));
        self
    }

    pub fn set_entry(mut self, name: &str) -> Self {
        match &self.entry {
            Some(current) if current != name => {
                self.errors.push(GraphConfigError::ConflictingEntry {
                    first: current.clone(),
                    second: name.to_string(),
                });
            }
            _ => self.entry = Some(name.to_string()),
        }
        self
    }

    /// Static edge. `START -> node` sets the entry; `to` may be `END`.
    pub fn add_edge(mut self, from: &str, to: &str) -> Self {
        if from == START {
            return self.set_entry(to);
        }
        self.edges.push((from.to_string(), to.to_string()));
        self
    }

    /// Conditional edge. `targets` must list every name `router` can return.
    pub fn add_conditional_edge<F, R, I, T>(mut self, from: &str, router: F, targets: I) -> Self
    where
        F: Fn(&GraphState<S>) -> R + Send + Sync + 'static,
        R: Into<Targets>,
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.conditional.push(ConditionalDecl {
            from: from.to_string(),
            targets: targets.into_iter().map(Into::into).collect(),
            router: boxed_router(router),
        });
        self
    }

    /// Registers the predicate telling whether `producer`'s output is already
    /// present. Supervisors never dispatch a producer whose guard holds.
    pub fn add_guard<F>(mut self, producer: &str, guard: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.guards.push((producer.to_string(), Arc::new(guard)));
        self
    }

    pub fn with_node_timeout(mut self, name: &str, timeout: Duration) -> Self {
        self.timeouts.push((name.to_string(), timeout));
        self
    }

    pub fn with_default_config(mut self, config: ExecutionConfig) -> Self {
        self.default_config = config;
        self
    }

    pub fn with_checkpointer<C>(mut self, checkpointer: C) -> Self
    where
        C: Checkpointer<S> + 'static,
    {
        self.checkpointer = Some(Arc::new(checkpointer));
        self
    }

    pub fn with_shared_checkpointer(mut self, checkpointer: Arc<dyn Checkpointer<S>>) -> Self {
        self.checkpointer = Some(checkpointer);
        self
    }

    /// Validates the declaration and freezes it. All-or-nothing: the first
    /// violated invariant is reported and no plan is produced.
    pub fn compile(self) -> Result<CompiledGraph<S>, GraphConfigError> {
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let mut seen_keys = HashSet::new();
        for field in S::fields() {
            if !seen_keys.insert(field.key) {
                return Err(GraphConfigError::DuplicateStateKey {
                    key: field.key.to_string(),
                });
            }
        }

        let positions: AHashMap<String, usize> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(position, node)| (node.name.clone(), position))
            .collect();
        let declared = |name: &str| positions.contains_key(name);
        let target_ok = |name: &str| name == END || positions.contains_key(name);

        let entry = self.entry.ok_or(GraphConfigError::MissingEntry)?;
        if !declared(entry.as_str()) {
            return Err(GraphConfigError::UnknownEntry { node: entry });
        }

        for (from, to) in &self.edges {
            if !declared(from.as_str()) || !target_ok(to.as_str()) {
                return Err(GraphConfigError::UnknownEdgeEndpoint {
                    from: from.clone(),
                    to: to.clone(),
                });
            }
        }

        for edge in &self.conditional {
            if !declared(edge.from.as_str()) {
                return Err(GraphConfigError::UnknownNode {
                    node: edge.from.clone(),
                    context: "conditional edge",
                });
            }
            if edge.targets.is_empty() {
                return Err(GraphConfigError::EmptyConditionalTargets {
                    node: edge.from.clone(),
                });
            }
            if let Some(target) = edge.targets.iter().find(|target| !target_ok(target.as_str())) {
                return Err(GraphConfigError::UnknownEdgeEndpoint {
                    from: edge.from.clone(),
                    to: target.clone(),
                });
            }
        }

        for node in &self.nodes {
            let has_static = self.edges.iter().any(|(from, _)| *from == node.name);
            let conditionals = self
                .conditional
                .iter()
                .filter(|edge| edge.from == node.name)
                .count();
            let conflicting = match &node.routes {
                Some(_) => has_static || conditionals > 0,
                None => conditionals > 1 || (has_static && conditionals > 0),
            };
            if conflicting {
                return Err(GraphConfigError::ConflictingEdges {
                    node: node.name.clone(),
                });
            }
            if let Some(routes) = &node.routes {
                if routes.targets.is_empty() {
                    return Err(GraphConfigError::EmptyConditionalTargets {
                        node: node.name.clone(),
                    });
                }
                if let Some(target) = routes.targets.iter().find(|target| !declared(target.as_str())) {
                    return Err(GraphConfigError::UnknownEdgeEndpoint {
                        from: node.name.clone(),
                        to: target.clone(),
                    });
                }
                if let Some(fallback) = &routes.fallback {
                    if !routes.targets.contains(fallback) {
                        return Err(GraphConfigError::FallbackNotTargeted {
                            supervisor: node.name.clone(),
                            fallback: fallback.clone(),
                        });
                    }
                }
            }
        }

        let mut guards = Guards::default();
        for (producer, guard) in self.guards {
            if !declared(producer.as_str()) {
                return Err(GraphConfigError::UnknownNode {
                    node: producer,
                    context: "guard",
                });
            }
            guards.insert(producer, guard);
        }
        let mut timeouts = AHashMap::new();
        for (name, timeout) in self.timeouts {
            if !declared(name.as_str()) {
                return Err(GraphConfigError::UnknownNode {
                    node: name,
                    context: "node timeout",
                });
            }
            timeouts.insert(name, timeout);
        }

        let mut graph = DiGraph::<String, EdgeKind>::new();
        let mut index: AHashMap<String, NodeIndex> = AHashMap::new();
        for node in &self.nodes {
            index.insert(node.name.clone(), graph.add_node(node.name.clone()));
        }
        let end = graph.add_node(END.to_string());
        index.insert(END.to_string(), end);

        for (from, to) in &self.edges {
            connect(&mut graph, &index, from, to, EdgeKind::Static);
        }
        for edge in &self.conditional {
            for target in &edge.targets {
                connect(&mut graph, &index, &edge.from, target, EdgeKind::Conditional);
            }
        }
        for node in &self.nodes {
            if let Some(routes) = &node.routes {
                for target in &routes.targets {
                    connect(&mut graph, &index, &node.name, target, EdgeKind::Decision);
                }
                connect(&mut graph, &index, &node.name, END, EdgeKind::Decision);
            }
        }

        let Some(start) = index_of(&index, &entry) else {
            return Err(GraphConfigError::UnknownEntry { node: entry });
        };
        let mut reachable = HashSet::new();
        let mut bfs = Bfs::new(&graph, start);
        while let Some(visited) = bfs.next(&graph) {
            reachable.insert(visited);
        }
        let mut live = HashSet::new();
        let reversed = Reversed(&graph);
        let mut bfs = Bfs::new(reversed, end);
        while let Some(visited) = bfs.next(reversed) {
            live.insert(visited);
        }
        for node in &self.nodes {
            let Some(at) = index_of(&index, &node.name) else {
                continue;
            };
            if !reachable.contains(&at) {
                return Err(GraphConfigError::UnreachableNode {
                    node: node.name.clone(),
                });
            }
            if !live.contains(&at) {
                return Err(GraphConfigError::NoPathToEnd {
                    node: node.name.clone(),
                });
            }
        }

        let mut conditional: AHashMap<String, ConditionalDecl<S>> = self
            .conditional
            .into_iter()
            .map(|edge| (edge.from.clone(), edge))
            .collect();
        let nodes = self
            .nodes
            .into_iter()
            .map(|node| {
                let routing = if let Some(routes) = node.routes {
                    Routing::Supervisor(routes)
                } else if let Some(edge) = conditional.remove(&node.name) {
                    Routing::Conditional {
                        targets: edge.targets,
                        router: edge.router,
                    }
                } else {
                    Routing::Static(
                        self.edges
                            .iter()
                            .filter(|(from, _)| *from == node.name)
                            .map(|(_, to)| to.clone())
                            .collect(),
                    )
                };
                PlanNode {
                    timeout: timeouts.get(&node.name).copied(),
                    name: node.name,
                    executor: node.executor,
                    routing,
                }
            })
            .collect();

        let program = GraphProgram {
            graph,
            nodes,
            positions,
            entry,
            guards,
        };
        Ok(CompiledGraph::new(
            program,
            self.default_config,
            self.checkpointer,
        ))
    }
}
