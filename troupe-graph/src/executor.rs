use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use serde_json::Value;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use troupe_core::{
    Checkpoint, Checkpointer, Decision, GraphState, StateSchema, StateUpdate, TroupeError,
};
use uuid::Uuid;

use crate::program::{GraphProgram, NodeOutput, Routing};
use crate::supervisor::resolve_decision;
use crate::{
    ExecutionConfig, ExecutionOptions, GraphContext, GraphDescription, GraphError, Observer,
    RunContext, END,
};

/// A validated, immutable graph ready to run. Cloning is cheap.
pub struct CompiledGraph<S: StateSchema> {
    program: Arc<GraphProgram<S>>,
    default_config: ExecutionConfig,
    checkpointer: Option<Arc<dyn Checkpointer<S>>>,
}

impl<S: StateSchema> Clone for CompiledGraph<S> {
    fn clone(&self) -> Self {
        Self {
            program: self.program.clone(),
            default_config: self.default_config.clone(),
            checkpointer: self.checkpointer.clone(),
        }
    }
}

struct RunSetup {
    thread_id: String,
    run_id: String,
    persist: bool,
    config: ExecutionConfig,
    observer: Option<Arc<dyn Observer>>,
    cancellation: CancellationToken,
}

type NodeResult<S> = (usize, Result<NodeOutput<S>, TroupeError>, Duration);

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl<S: StateSchema> CompiledGraph<S> {
    pub(crate) fn new(
        program: GraphProgram<S>,
        default_config: ExecutionConfig,
        checkpointer: Option<Arc<dyn Checkpointer<S>>>,
    ) -> Self {
        Self {
            program: Arc::new(program),
            default_config,
            checkpointer,
        }
    }

    pub fn entry(&self) -> &str {
        &self.program.entry
    }

    pub fn node_names(&self) -> Vec<String> {
        self.program.node_names()
    }

    pub fn edge_names(&self) -> Vec<(String, String)> {
        self.program.edge_names()
    }

    pub fn describe(&self) -> GraphDescription {
        self.program.describe()
    }

    pub fn default_config(&self) -> &ExecutionConfig {
        &self.default_config
    }

    /// Runs once from `state` with no thread continuity and no checkpoints.
    pub async fn invoke(&self, state: GraphState<S>) -> Result<GraphState<S>, GraphError> {
        self.invoke_with_options(state, ExecutionOptions::default())
            .await
    }

    pub async fn invoke_with_options(
        &self,
        state: GraphState<S>,
        options: ExecutionOptions,
    ) -> Result<GraphState<S>, GraphError> {
        let setup = self.setup(None, false, options);
        self.drive(&setup, state, vec![self.program.entry.clone()], 0)
            .await
    }

    /// Continues the conversation stored under `thread_id`.
    ///
    /// A pending run is resumed and `input` is ignored. After a completed
    /// run, a new run starts from the stored state with `input` applied.
    /// A thread with no checkpoint starts from the default state.
    pub async fn invoke_thread(
        &self,
        thread_id: &str,
        input: StateUpdate<S>,
    ) -> Result<GraphState<S>, GraphError> {
        self.invoke_thread_with_options(thread_id, input, ExecutionOptions::default())
            .await
    }

    pub async fn invoke_thread_with_options(
        &self,
        thread_id: &str,
        input: StateUpdate<S>,
        options: ExecutionOptions,
    ) -> Result<GraphState<S>, GraphError> {
        let setup = self.setup(Some(thread_id), true, options);
        let entry = vec![self.program.entry.clone()];
        match self.latest_checkpoint(thread_id).await? {
            Some(checkpoint) if !checkpoint.is_complete() => {
                tracing::warn!(
                    thread_id,
                    step = checkpoint.step,
                    "thread has a pending run; resuming it and ignoring the new input"
                );
                self.drive(&setup, checkpoint.state, checkpoint.queue, checkpoint.step)
                    .await
            }
            Some(checkpoint) => {
                let state = checkpoint.state.apply(input);
                self.drive(&setup, state, entry, checkpoint.step).await
            }
            None => {
                let state = GraphState::default().apply(input);
                self.drive(&setup, state, entry, 0).await
            }
        }
    }

    /// Resumes the pending run of `thread_id` from its last committed superstep.
    pub async fn resume(&self, thread_id: &str) -> Result<GraphState<S>, GraphError> {
        self.resume_with_options(thread_id, ExecutionOptions::default())
            .await
    }

    pub async fn resume_with_options(
        &self,
        thread_id: &str,
        options: ExecutionOptions,
    ) -> Result<GraphState<S>, GraphError> {
        let checkpoint = self
            .latest_checkpoint(thread_id)
            .await?
            .filter(|checkpoint| !checkpoint.is_complete())
            .ok_or_else(|| GraphError::NothingToResume {
                thread_id: thread_id.to_string(),
            })?;
        let setup = self.setup(Some(thread_id), true, options);
        self.drive(&setup, checkpoint.state, checkpoint.queue, checkpoint.step)
            .await
    }

    pub async fn latest_checkpoint(
        &self,
        thread_id: &str,
    ) -> Result<Option<Checkpoint<S>>, GraphError> {
        match &self.checkpointer {
            Some(checkpointer) => checkpointer
                .load(thread_id)
                .await
                .map_err(|err| GraphError::Checkpoint(err.to_string())),
            None => Ok(None),
        }
    }

    /// Runs as the child of a sub-graph node: own thread id, no checkpoints,
    /// parent's cancellation.
    pub(crate) async fn invoke_nested(
        &self,
        state: GraphState<S>,
        thread_id: String,
        cancellation: CancellationToken,
    ) -> Result<GraphState<S>, GraphError> {
        let options = ExecutionOptions {
            cancellation: Some(cancellation),
            ..Default::default()
        };
        let setup = self.setup(Some(&thread_id), false, options);
        self.drive(&setup, state, vec![self.program.entry.clone()], 0)
            .await
    }

    fn setup(&self, thread_id: Option<&str>, persist: bool, options: ExecutionOptions) -> RunSetup {
        let config = self.default_config.merge(&options);
        let run_id = options
            .run_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        RunSetup {
            thread_id: thread_id.map(str::to_string).unwrap_or_else(|| run_id.clone()),
            run_id,
            persist,
            config,
            observer: options.observer,
            cancellation: options.cancellation.unwrap_or_else(CancellationToken::new),
        }
    }

    fn positions_of(&self, queue: &[String]) -> Result<Vec<usize>, GraphError> {
        let mut positions = BTreeSet::new();
        for name in queue {
            let position = self.program.position(name).ok_or_else(|| {
                GraphError::Checkpoint(format!("queued node '{name}' is not part of this graph"))
            })?;
            positions.insert(position);
        }
        Ok(positions.into_iter().collect())
    }

    /// Superstep loop. The next active set is computed before the checkpoint
    /// is saved, so a routing failure discards the superstep that led to it.
    async fn drive(
        &self,
        setup: &RunSetup,
        mut state: GraphState<S>,
        queue: Vec<String>,
        mut step: u64,
    ) -> Result<GraphState<S>, GraphError> {
        let mut active = self.positions_of(&queue)?;
        let mut executed = 0usize;

        while !active.is_empty() {
            if setup.cancellation.is_cancelled() {
                return Err(GraphError::Cancelled { step });
            }
            if let Some(max) = setup.config.max_steps {
                if executed >= max {
                    return Err(GraphError::MaxStepsExceeded { max });
                }
            }

            let span = tracing::info_span!(
                "superstep",
                thread_id = %setup.thread_id,
                run_id = %setup.run_id,
                step
            );
            let snapshot = Arc::new(state);
            let outputs = self
                .superstep(setup, &snapshot, &active, step)
                .instrument(span.clone())
                .await?;

            let mut merged = Arc::try_unwrap(snapshot).unwrap_or_else(|shared| (*shared).clone());
            let mut ran = Vec::with_capacity(outputs.len());
            for (position, output) in outputs {
                merged = merged.apply(output.update);
                ran.push((position, output.decision));
            }

            let next = match self.route(&ran, &merged) {
                Ok(next) => next,
                Err(error) => {
                    span.in_scope(|| tracing::error!(%error, "routing failed"));
                    if let (Some(observer), Some(node)) = (&setup.observer, error.node()) {
                        observer.on_error(node, &error).await;
                    }
                    return Err(error);
                }
            };
            step += 1;
            executed += 1;

            if setup.persist {
                if let Some(checkpointer) = &self.checkpointer {
                    let checkpoint = Checkpoint::new(
                        setup.thread_id.clone(),
                        setup.run_id.clone(),
                        merged.clone(),
                        step,
                        self.names(ran.iter().map(|(position, _)| *position)),
                        self.names(next.iter().copied()),
                    );
                    checkpointer
                        .save(&checkpoint)
                        .await
                        .map_err(|err| GraphError::Checkpoint(err.to_string()))?;
                    if let Some(observer) = &setup.observer {
                        observer.on_checkpoint_saved(&setup.thread_id, step).await;
                    }
                }
            }

            state = merged;
            active = next;
        }

        tracing::debug!(thread_id = %setup.thread_id, run_id = %setup.run_id, step, "run completed");
        Ok(state)
    }

    fn names(&self, positions: impl Iterator<Item = usize>) -> Vec<String> {
        positions
            .map(|position| self.program.nodes[position].name.clone())
            .collect()
    }

    /// Runs every active node against the same snapshot and waits for all of
    /// them. Outputs are returned in declaration order; any failure discards
    /// the whole superstep.
    async fn superstep(
        &self,
        setup: &RunSetup,
        snapshot: &Arc<GraphState<S>>,
        active: &[usize],
        step: u64,
    ) -> Result<Vec<(usize, NodeOutput<S>)>, GraphError> {
        let mut tasks: JoinSet<NodeResult<S>> = JoinSet::new();
        for &position in active {
            let node = &self.program.nodes[position];
            if let Some(observer) = &setup.observer {
                let input = serde_json::to_value(&snapshot.data).unwrap_or(Value::Null);
                observer.on_node_start(&node.name, &input).await;
            }
            tracing::debug!(node = %node.name, "node started");

            let executor = node.executor.clone();
            let limit = node.timeout.or(setup.config.node_timeout);
            let context = GraphContext {
                node_id: node.name.clone(),
                run: RunContext {
                    thread_id: setup.thread_id.clone(),
                    run_id: setup.run_id.clone(),
                    step,
                },
                cancellation: setup.cancellation.clone(),
            };
            let input = Arc::clone(snapshot);
            tasks.spawn(async move {
                let started = Instant::now();
                let call = AssertUnwindSafe(async move {
                    executor.run(GraphState::clone(&input), &context).await
                })
                .catch_unwind();
                let outcome = match limit {
                    Some(limit) => match tokio::time::timeout(limit, call).await {
                        Ok(outcome) => outcome,
                        Err(_) => Ok(Err(TroupeError::Timeout(limit))),
                    },
                    None => call.await,
                };
                let result = outcome.unwrap_or_else(|panic| {
                    Err(TroupeError::Custom(format!(
                        "node panicked: {}",
                        panic_message(panic.as_ref())
                    )))
                });
                (position, result, started.elapsed())
            });
        }

        let mut finished = Vec::with_capacity(active.len());
        loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok(done)) => finished.push(done),
                    Some(Err(join_error)) => {
                        tracing::error!(%join_error, "node task did not complete");
                        tasks.abort_all();
                        while tasks.join_next().await.is_some() {}
                        return Err(GraphError::Cancelled { step });
                    }
                    None => break,
                },
                _ = setup.cancellation.cancelled() => {
                    tracing::warn!("run cancelled during superstep; discarding it");
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(GraphError::Cancelled { step });
                }
            }
        }
        finished.sort_by_key(|(position, _, _)| *position);

        let mut outputs = Vec::with_capacity(finished.len());
        let mut failure = None;
        for (position, result, elapsed) in finished {
            let name = &self.program.nodes[position].name;
            match result {
                Ok(output) => {
                    tracing::debug!(node = %name, duration_ms = elapsed.as_millis() as u64, "node finished");
                    if let Some(observer) = &setup.observer {
                        let output_json =
                            serde_json::to_value(&output.update.data).unwrap_or(Value::Null);
                        observer
                            .on_node_end(name, &output_json, elapsed.as_millis())
                            .await;
                    }
                    outputs.push((position, output));
                }
                Err(source) => {
                    tracing::error!(node = %name, error = %source, "node failed");
                    if failure.is_none() {
                        failure = Some(GraphError::NodeFailed {
                            node: name.clone(),
                            source,
                        });
                    }
                }
            }
        }

        if let Some(error) = failure {
            if let (Some(observer), Some(node)) = (&setup.observer, error.node()) {
                observer.on_error(node, &error).await;
            }
            return Err(error);
        }
        Ok(outputs)
    }

    /// Next active set, deduplicated and in declaration order. Evaluated
    /// against the merged state of the superstep that just ran.
    fn route(
        &self,
        ran: &[(usize, Option<Decision>)],
        state: &GraphState<S>,
    ) -> Result<Vec<usize>, GraphError> {
        let mut next = BTreeSet::new();
        let no_decision = Decision::default();
        for (position, decision) in ran {
            let node = &self.program.nodes[*position];
            let targets = match &node.routing {
                Routing::Static(targets) => targets.clone(),
                Routing::Conditional { targets, router } => {
                    let chosen = std::panic::catch_unwind(AssertUnwindSafe(|| router(state)))
                        .map_err(|panic| GraphError::RouterPanicked {
                            node: node.name.clone(),
                            message: panic_message(panic.as_ref()),
                        })?
                        .into_vec();
                    if let Some(undeclared) = chosen.iter().find(|target| !targets.contains(target)) {
                        return Err(GraphError::Routing {
                            node: node.name.clone(),
                            target: undeclared.clone(),
                        });
                    }
                    chosen
                }
                Routing::Supervisor(routes) => resolve_decision(
                    &node.name,
                    decision.as_ref().unwrap_or(&no_decision),
                    routes,
                    &self.program.guards,
                    &state.data,
                )?,
            };
            for target in targets {
                if target == END {
                    continue;
                }
                let position = self
                    .program
                    .position(&target)
                    .ok_or_else(|| GraphError::Routing {
                        node: node.name.clone(),
                        target: target.clone(),
                    })?;
                next.insert(position);
            }
        }
        Ok(next.into_iter().collect())
    }
}
