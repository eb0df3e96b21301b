use sqlx::SqlitePool;

use crate::error::CheckpointSqlError;
use crate::schema::{MIGRATION_STATEMENTS_SQL, SCHEMA_VERSION};

/// Creates the checkpoint tables if needed and records the schema version.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), CheckpointSqlError> {
    for statement in MIGRATION_STATEMENTS_SQL {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(CheckpointSqlError::Migration)?;
    }

    let recorded: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM troupe_schema_version")
        .fetch_one(pool)
        .await
        .map_err(CheckpointSqlError::Migration)?;
    if recorded.is_none() {
        sqlx::query("INSERT INTO troupe_schema_version (version) VALUES (?)")
            .bind(i64::from(SCHEMA_VERSION))
            .execute(pool)
            .await
            .map_err(CheckpointSqlError::Migration)?;
    }
    tracing::debug!(version = SCHEMA_VERSION, "checkpoint schema ready");

    Ok(())
}
