use thiserror::Error;
use troupe_graph::GraphConfigError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Graph(#[from] GraphConfigError),
    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidSetting {
        key: &'static str,
        value: String,
        reason: String,
    },
}
