use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointSqlError {
    #[error("failed to open checkpoint database: {0}")]
    Connection(#[source] sqlx::Error),
    #[error("checkpoint migration failed: {0}")]
    Migration(#[source] sqlx::Error),
    #[error("checkpoint query failed: {0}")]
    Query(#[source] sqlx::Error),
    #[error("checkpoint encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("checkpoint column '{column}' is out of range")]
    OutOfRange { column: &'static str },
}

impl From<CheckpointSqlError> for troupe_core::TroupeError {
    fn from(error: CheckpointSqlError) -> Self {
        troupe_core::TroupeError::CheckpointFailed(error.to_string())
    }
}
