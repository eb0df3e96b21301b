use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use troupe_core::{GraphState, StateSchema, StateUpdate};
use uuid::Uuid;

use crate::executor::panic_message;
use crate::{CompiledGraph, ExecutionOptions, GraphError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Identifies a submitted run.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunHandle {
    pub run_id: String,
    pub thread_id: String,
}

struct RunEntry<S: StateSchema> {
    status: watch::Receiver<RunStatus>,
    outcome: Option<Result<GraphState<S>, String>>,
    cancellation: CancellationToken,
}

type RunTable<S> = Arc<RwLock<HashMap<String, RunEntry<S>>>>;

/// Submits runs in the background and tracks their status and result.
pub struct RunManager<S: StateSchema> {
    graph: CompiledGraph<S>,
    runs: RunTable<S>,
}

impl<S: StateSchema> Clone for RunManager<S> {
    fn clone(&self) -> Self {
        Self {
            graph: self.graph.clone(),
            runs: self.runs.clone(),
        }
    }
}

fn poisoned() -> GraphError {
    GraphError::RunFailed {
        message: "run table lock poisoned".to_string(),
    }
}

impl<S: StateSchema> RunManager<S> {
    pub fn new(graph: CompiledGraph<S>) -> Self {
        Self {
            graph,
            runs: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawns `invoke_thread(thread_id, input)` and returns immediately.
    pub fn submit(
        &self,
        thread_id: &str,
        input: StateUpdate<S>,
    ) -> Result<RunHandle, GraphError> {
        self.submit_with_options(thread_id, input, ExecutionOptions::default())
    }

    pub fn submit_with_options(
        &self,
        thread_id: &str,
        input: StateUpdate<S>,
        mut options: ExecutionOptions,
    ) -> Result<RunHandle, GraphError> {
        let run_id = options
            .run_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let cancellation = options
            .cancellation
            .clone()
            .unwrap_or_else(CancellationToken::new);
        options.run_id = Some(run_id.clone());
        options.cancellation = Some(cancellation.clone());

        let (status_tx, status_rx) = watch::channel(RunStatus::Pending);
        self.runs.write().map_err(|_| poisoned())?.insert(
            run_id.clone(),
            RunEntry {
                status: status_rx,
                outcome: None,
                cancellation,
            },
        );

        let handle = RunHandle {
            run_id: run_id.clone(),
            thread_id: thread_id.to_string(),
        };
        let graph = self.graph.clone();
        let runs = self.runs.clone();
        let thread_id = thread_id.to_string();
        tokio::spawn(async move {
            status_tx.send_replace(RunStatus::Running);
            let result = AssertUnwindSafe(graph.invoke_thread_with_options(&thread_id, input, options))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(GraphError::RunFailed {
                        message: format!("run panicked: {}", panic_message(panic.as_ref())),
                    })
                });
            let status = match &result {
                Ok(_) => RunStatus::Completed,
                Err(error) => {
                    tracing::error!(run_id = %run_id, %error, "run failed");
                    RunStatus::Failed
                }
            };
            if let Ok(mut table) = runs.write() {
                if let Some(entry) = table.get_mut(&run_id) {
                    entry.outcome = Some(result.map_err(|error| error.to_string()));
                }
            }
            status_tx.send_replace(status);
        });
        Ok(handle)
    }

    pub fn status(&self, handle: &RunHandle) -> Result<RunStatus, GraphError> {
        let table = self.runs.read().map_err(|_| poisoned())?;
        let entry = table
            .get(&handle.run_id)
            .ok_or_else(|| GraphError::RunNotFound(handle.run_id.clone()))?;
        let status = *entry.status.borrow();
        Ok(status)
    }

    /// Final state of a completed run. Fails with `RunNotFinished` while the
    /// run is pending or running.
    pub fn result(&self, handle: &RunHandle) -> Result<GraphState<S>, GraphError> {
        let table = self.runs.read().map_err(|_| poisoned())?;
        let entry = table
            .get(&handle.run_id)
            .ok_or_else(|| GraphError::RunNotFound(handle.run_id.clone()))?;
        let status = *entry.status.borrow();
        match (&entry.outcome, status) {
            (Some(Ok(state)), RunStatus::Completed) => Ok(state.clone()),
            (Some(Err(message)), RunStatus::Failed) => Err(GraphError::RunFailed {
                message: message.clone(),
            }),
            _ => Err(GraphError::RunNotFinished { status }),
        }
    }

    /// Waits until the run reaches `Completed` or `Failed`, then returns its result.
    pub async fn wait(&self, handle: &RunHandle) -> Result<GraphState<S>, GraphError> {
        let mut status = {
            let table = self.runs.read().map_err(|_| poisoned())?;
            table
                .get(&handle.run_id)
                .ok_or_else(|| GraphError::RunNotFound(handle.run_id.clone()))?
                .status
                .clone()
        };
        status
            .wait_for(|status| status.is_terminal())
            .await
            .map_err(|_| GraphError::RunFailed {
                message: "run task ended without reporting".to_string(),
            })?;
        self.result(handle)
    }

    /// Requests cooperative cancellation; the run fails with `Cancelled`.
    pub fn cancel(&self, handle: &RunHandle) -> Result<(), GraphError> {
        let table = self.runs.read().map_err(|_| poisoned())?;
        let entry = table
            .get(&handle.run_id)
            .ok_or_else(|| GraphError::RunNotFound(handle.run_id.clone()))?;
        entry.cancellation.cancel();
        Ok(())
    }

    /// Drops a finished run from the table and returns its result. Pending
    /// and running runs are left in place and fail with `RunNotFinished`.
    pub fn forget(&self, handle: &RunHandle) -> Result<GraphState<S>, GraphError> {
        let mut table = self.runs.write().map_err(|_| poisoned())?;
        let entry = table
            .get(&handle.run_id)
            .ok_or_else(|| GraphError::RunNotFound(handle.run_id.clone()))?;
        let status = *entry.status.borrow();
        if !status.is_terminal() || entry.outcome.is_none() {
            return Err(GraphError::RunNotFinished { status });
        }
        let outcome = table
            .remove(&handle.run_id)
            .and_then(|entry| entry.outcome)
            .ok_or_else(|| GraphError::RunNotFound(handle.run_id.clone()))?;
        outcome.map_err(|message| GraphError::RunFailed { message })
    }

    /// Number of runs currently tracked.
    pub fn len(&self) -> usize {
        self.runs.read().map(|table| table.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
