use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::{GraphState, StateSchema};
use crate::TroupeError;

/// State committed at a superstep boundary of one thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(bound = "S: StateSchema")]
pub struct Checkpoint<S: StateSchema> {
    pub thread_id: String,
    pub run_id: String,
    pub state: GraphState<S>,
    /// Number of supersteps committed on this thread so far.
    pub step: u64,
    /// Nodes executed by the superstep that produced this checkpoint.
    pub ran: Vec<String>,
    /// Active node set for the next superstep; empty once the run completed.
    pub queue: Vec<String>,
    pub created_at: String,
}

impl<S: StateSchema> Checkpoint<S> {
    pub fn new(
        thread_id: String,
        run_id: String,
        state: GraphState<S>,
        step: u64,
        ran: Vec<String>,
        queue: Vec<String>,
    ) -> Self {
        Self {
            thread_id,
            run_id,
            state,
            step,
            ran,
            queue,
            created_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Key -> blob checkpoint storage. Implementations own the encoding.
#[async_trait::async_trait]
pub trait Checkpointer<S: StateSchema>: Send + Sync {
    async fn save(&self, checkpoint: &Checkpoint<S>) -> Result<(), TroupeError>;
    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, TroupeError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointMetadata {
    pub seq: u64,
    pub step: u64,
    pub created_at: String,
}

#[async_trait::async_trait]
pub trait HistoryCheckpointer<S: StateSchema>: Send + Sync {
    async fn list_checkpoints(
        &self,
        thread_id: &str,
    ) -> Result<Vec<CheckpointMetadata>, TroupeError>;
}

#[derive(Clone)]
pub struct InMemoryCheckpointer<S: StateSchema> {
    inner: Arc<RwLock<HashMap<String, Vec<Checkpoint<S>>>>>,
}

impl<S: StateSchema> Default for InMemoryCheckpointer<S> {
    fn default() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<S: StateSchema> InMemoryCheckpointer<S> {
    /// Drops every checkpoint of a thread.
    pub fn clear(&self, thread_id: &str) -> Result<(), TroupeError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| TroupeError::CheckpointFailed("lock".into()))?;
        guard.remove(thread_id);
        Ok(())
    }
}

#[async_trait::async_trait]
impl<S: StateSchema> Checkpointer<S> for InMemoryCheckpointer<S> {
    async fn save(&self, checkpoint: &Checkpoint<S>) -> Result<(), TroupeError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| TroupeError::CheckpointFailed("lock".into()))?;
        guard
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .push(checkpoint.clone());
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, TroupeError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| TroupeError::CheckpointFailed("lock".into()))?;
        Ok(guard
            .get(thread_id)
            .and_then(|history| history.last().cloned()))
    }
}

#[async_trait::async_trait]
impl<S: StateSchema> HistoryCheckpointer<S> for InMemoryCheckpointer<S> {
    async fn list_checkpoints(
        &self,
        thread_id: &str,
    ) -> Result<Vec<CheckpointMetadata>, TroupeError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| TroupeError::CheckpointFailed("lock".into()))?;
        let history = guard.get(thread_id).cloned().unwrap_or_default();
        let metadata = history
            .into_iter()
            .enumerate()
            .map(|(index, cp)| CheckpointMetadata {
                seq: index as u64 + 1,
                step: cp.step,
                created_at: cp.created_at,
            })
            .collect();
        Ok(metadata)
    }
}
