use std::sync::Arc;

use ahash::AHashMap;
use troupe_core::{Decision, GraphState, StateSchema, StateUpdate, TroupeError};

use crate::{GraphContext, GraphError, END};

/// Decision plus the partial update the supervisor wants committed with it.
#[derive(Debug, Clone)]
pub struct SupervisorOutput<S: StateSchema> {
    pub decision: Decision,
    pub update: StateUpdate<S>,
}

impl<S: StateSchema> SupervisorOutput<S> {
    pub fn new(decision: Decision) -> Self {
        Self {
            decision,
            update: StateUpdate::empty(),
        }
    }

    pub fn with_update(mut self, update: StateUpdate<S>) -> Self {
        self.update = update;
        self
    }
}

/// A node whose result is a routing decision.
#[async_trait::async_trait]
pub trait SupervisorNode<S: StateSchema>: Send + Sync + 'static {
    async fn decide(
        &self,
        input: GraphState<S>,
        context: &GraphContext,
    ) -> Result<SupervisorOutput<S>, TroupeError>;
}

/// Closed set of nodes a supervisor may dispatch to, and where to go when
/// the guards leave nothing to run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SupervisorRoutes {
    pub(crate) targets: Vec<String>,
    pub(crate) fallback: Option<String>,
}

impl SupervisorRoutes {
    pub fn new<I, T>(targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, node: impl Into<String>) -> Self {
        self.fallback = Some(node.into());
        self
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn fallback(&self) -> Option<&str> {
        self.fallback.as_deref()
    }
}

pub(crate) type GuardFn<S> = Arc<dyn Fn(&S) -> bool + Send + Sync>;

/// Producer predicates: "this node's output is already in state".
pub(crate) struct Guards<S> {
    producers: AHashMap<String, GuardFn<S>>,
}

impl<S> Default for Guards<S> {
    fn default() -> Self {
        Self {
            producers: AHashMap::new(),
        }
    }
}

impl<S: StateSchema> Guards<S> {
    pub(crate) fn insert(&mut self, node: String, guard: GuardFn<S>) {
        self.producers.insert(node, guard);
    }

    pub(crate) fn nodes(&self) -> impl Iterator<Item = &String> {
        self.producers.keys()
    }

    pub(crate) fn contains(&self, node: &str) -> bool {
        self.producers.contains_key(node)
    }

    pub(crate) fn satisfied(&self, node: &str, state: &S) -> bool {
        self.producers
            .get(node)
            .map(|guard| guard(state))
            .unwrap_or(false)
    }
}

/// Turns a decision into the next targets of `supervisor`.
///
/// `FINISH` ends the run regardless of other targets. Every remaining target
/// must be declared. Targets whose producer guard holds are dropped; if none
/// survive, the fallback runs unless it is satisfied too, in which case the
/// run ends.
pub(crate) fn resolve_decision<S: StateSchema>(
    supervisor: &str,
    decision: &Decision,
    routes: &SupervisorRoutes,
    guards: &Guards<S>,
    state: &S,
) -> Result<Vec<String>, GraphError> {
    if decision.is_finish() {
        return Ok(vec![END.to_string()]);
    }

    if let Some(unknown) = decision
        .targets
        .iter()
        .find(|target| !routes.targets.contains(target))
    {
        return Err(GraphError::Routing {
            node: supervisor.to_string(),
            target: unknown.clone(),
        });
    }

    let (kept, dropped): (Vec<&String>, Vec<&String>) = decision
        .targets
        .iter()
        .partition(|target| !guards.satisfied(target, state));
    if !dropped.is_empty() {
        tracing::warn!(
            supervisor,
            dropped = ?dropped,
            "guard dropped already satisfied producers from decision"
        );
    }
    if !kept.is_empty() {
        return Ok(kept.into_iter().cloned().collect());
    }

    match routes.fallback.as_deref() {
        Some(fallback) if !guards.satisfied(fallback, state) => {
            tracing::warn!(supervisor, fallback, "decision emptied by guards, routing to fallback");
            Ok(vec![fallback.to_string()])
        }
        _ => Ok(vec![END.to_string()]),
    }
}
