//! SQLite backend for troupe checkpoints.
//!
//! Every committed superstep becomes one row of `troupe_checkpoints`,
//! keyed by thread id and a per-thread sequence number. The state is
//! stored as JSON and decoded back into the caller's schema on load.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use troupe_core::{
    Checkpoint, CheckpointMetadata, Checkpointer, GraphState, HistoryCheckpointer, StateSchema,
    TroupeError,
};

pub mod error;
pub mod migrations;
pub mod ops;
pub mod schema;

pub use error::CheckpointSqlError;

use crate::migrations::run_migrations;
use crate::ops::{
    delete_thread, list_checkpoint_metadata, load_latest_checkpoint, save_checkpoint,
};

#[derive(Debug, Clone)]
pub struct SqliteCheckpointer {
    pool: sqlx::SqlitePool,
}

#[derive(Debug, Clone)]
pub struct SqliteCheckpointerBuilder {
    database_url: String,
    max_connections: u32,
    create_if_missing: bool,
}

impl SqliteCheckpointer {
    /// `sqlite::memory:` keeps everything in one connection; use a file URL
    /// such as `sqlite://runs.db` for checkpoints that outlive the process.
    pub fn builder(database_url: impl Into<String>) -> SqliteCheckpointerBuilder {
        SqliteCheckpointerBuilder {
            database_url: database_url.into(),
            max_connections: 1,
            create_if_missing: true,
        }
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    /// Drops every checkpoint of a thread.
    pub async fn clear(&self, thread_id: &str) -> Result<u64, CheckpointSqlError> {
        delete_thread(&self.pool, thread_id).await
    }
}

impl SqliteCheckpointerBuilder {
    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn create_if_missing(mut self, create_if_missing: bool) -> Self {
        self.create_if_missing = create_if_missing;
        self
    }

    pub async fn build(self) -> Result<SqliteCheckpointer, CheckpointSqlError> {
        let options = SqliteConnectOptions::from_str(&self.database_url)
            .map_err(CheckpointSqlError::Connection)?
            .create_if_missing(self.create_if_missing);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await
            .map_err(CheckpointSqlError::Connection)?;

        run_migrations(&pool).await?;

        Ok(SqliteCheckpointer { pool })
    }
}

fn out_of_range(column: &'static str) -> CheckpointSqlError {
    CheckpointSqlError::OutOfRange { column }
}

#[async_trait::async_trait]
impl<S: StateSchema> Checkpointer<S> for SqliteCheckpointer {
    async fn save(&self, checkpoint: &Checkpoint<S>) -> Result<(), TroupeError> {
        let step = i64::try_from(checkpoint.step).map_err(|_| out_of_range("step"))?;
        let ran_json = serde_json::to_string(&checkpoint.ran).map_err(CheckpointSqlError::from)?;
        let queue_json =
            serde_json::to_string(&checkpoint.queue).map_err(CheckpointSqlError::from)?;
        let state_json =
            serde_json::to_string(&checkpoint.state).map_err(CheckpointSqlError::from)?;

        save_checkpoint(
            &self.pool,
            &checkpoint.thread_id,
            &checkpoint.run_id,
            &checkpoint.created_at,
            step,
            &ran_json,
            &queue_json,
            &state_json,
        )
        .await?;
        Ok(())
    }

    async fn load(&self, thread_id: &str) -> Result<Option<Checkpoint<S>>, TroupeError> {
        let Some(stored) = load_latest_checkpoint(&self.pool, thread_id).await? else {
            return Ok(None);
        };

        let step = u64::try_from(stored.step).map_err(|_| out_of_range("step"))?;
        let ran: Vec<String> =
            serde_json::from_str(&stored.ran_json).map_err(CheckpointSqlError::from)?;
        let queue: Vec<String> =
            serde_json::from_str(&stored.queue_json).map_err(CheckpointSqlError::from)?;
        let state: GraphState<S> =
            serde_json::from_str(&stored.state_json).map_err(CheckpointSqlError::from)?;

        Ok(Some(Checkpoint {
            thread_id: stored.thread_id,
            run_id: stored.run_id,
            state,
            step,
            ran,
            queue,
            created_at: stored.created_at,
        }))
    }
}

#[async_trait::async_trait]
impl<S: StateSchema> HistoryCheckpointer<S> for SqliteCheckpointer {
    async fn list_checkpoints(
        &self,
        thread_id: &str,
    ) -> Result<Vec<CheckpointMetadata>, TroupeError> {
        let rows = list_checkpoint_metadata(&self.pool, thread_id).await?;
        rows.into_iter()
            .map(|row| -> Result<CheckpointMetadata, TroupeError> {
                Ok(CheckpointMetadata {
                    seq: u64::try_from(row.seq).map_err(|_| out_of_range("seq"))?,
                    step: u64::try_from(row.step).map_err(|_| out_of_range("step"))?,
                    created_at: row.created_at,
                })
            })
            .collect()
    }
}
