use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::error::CheckpointSqlError;

/// A checkpoint row as written by [`save_checkpoint`], with its JSON
/// columns still encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredCheckpoint {
    pub thread_id: String,
    pub seq: i64,
    pub run_id: String,
    pub created_at: String,
    pub step: i64,
    pub ran_json: String,
    pub queue_json: String,
    pub state_json: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMetadata {
    pub seq: i64,
    pub step: i64,
    pub created_at: String,
}

fn stored_checkpoint(row: &SqliteRow) -> Result<StoredCheckpoint, sqlx::Error> {
    Ok(StoredCheckpoint {
        thread_id: row.try_get("thread_id")?,
        seq: row.try_get("seq")?,
        run_id: row.try_get("run_id")?,
        created_at: row.try_get("created_at")?,
        step: row.try_get("step")?,
        ran_json: row.try_get("ran_json")?,
        queue_json: row.try_get("queue_json")?,
        state_json: row.try_get("state_json")?,
    })
}

/// Appends a row for `thread_id` with the next sequence number of that thread.
#[allow(clippy::too_many_arguments)]
pub async fn save_checkpoint(
    pool: &SqlitePool,
    thread_id: &str,
    run_id: &str,
    created_at: &str,
    step: i64,
    ran_json: &str,
    queue_json: &str,
    state_json: &str,
) -> Result<(), CheckpointSqlError> {
    sqlx::query(
        "INSERT INTO troupe_checkpoints \
         (thread_id, seq, run_id, created_at, step, ran_json, queue_json, state_json) \
         SELECT ?, COALESCE(MAX(seq), 0) + 1, ?, ?, ?, ?, ?, ? \
         FROM troupe_checkpoints WHERE thread_id = ?",
    )
    .bind(thread_id)
    .bind(run_id)
    .bind(created_at)
    .bind(step)
    .bind(ran_json)
    .bind(queue_json)
    .bind(state_json)
    .bind(thread_id)
    .execute(pool)
    .await
    .map_err(CheckpointSqlError::Query)?;
    Ok(())
}

pub async fn load_latest_checkpoint(
    pool: &SqlitePool,
    thread_id: &str,
) -> Result<Option<StoredCheckpoint>, CheckpointSqlError> {
    let row = sqlx::query(
        "SELECT thread_id, seq, run_id, created_at, step, ran_json, queue_json, state_json \
         FROM troupe_checkpoints WHERE thread_id = ? ORDER BY seq DESC LIMIT 1",
    )
    .bind(thread_id)
    .fetch_optional(pool)
    .await
    .map_err(CheckpointSqlError::Query)?;

    row.as_ref()
        .map(stored_checkpoint)
        .transpose()
        .map_err(CheckpointSqlError::Query)
}

pub async fn list_checkpoint_metadata(
    pool: &SqlitePool,
    thread_id: &str,
) -> Result<Vec<StoredMetadata>, CheckpointSqlError> {
    let rows = sqlx::query(
        "SELECT seq, step, created_at FROM troupe_checkpoints \
         WHERE thread_id = ? ORDER BY seq ASC",
    )
    .bind(thread_id)
    .fetch_all(pool)
    .await
    .map_err(CheckpointSqlError::Query)?;

    rows.iter()
        .map(|row| {
            Ok(StoredMetadata {
                seq: row.try_get("seq")?,
                step: row.try_get("step")?,
                created_at: row.try_get("created_at")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()
        .map_err(CheckpointSqlError::Query)
}

/// Removes every checkpoint of a thread and returns how many rows went.
pub async fn delete_thread(pool: &SqlitePool, thread_id: &str) -> Result<u64, CheckpointSqlError> {
    let result = sqlx::query("DELETE FROM troupe_checkpoints WHERE thread_id = ?")
        .bind(thread_id)
        .execute(pool)
        .await
        .map_err(CheckpointSqlError::Query)?;
    Ok(result.rows_affected())
}
