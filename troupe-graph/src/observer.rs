use serde_json::Value;

use crate::GraphError;

/// Programmatic hooks into a run. Every method defaults to a no-op.
///
/// `on_node_start` receives the node's input snapshot and `on_node_end` its
/// partial update, both as JSON.
#[async_trait::async_trait]
pub trait Observer: Send + Sync + 'static {
    async fn on_node_start(&self, _node_id: &str, _input: &Value) {}
    async fn on_node_end(&self, _node_id: &str, _output: &Value, _duration_ms: u128) {}
    async fn on_error(&self, _node_id: &str, _error: &GraphError) {}
    async fn on_checkpoint_saved(&self, _thread_id: &str, _step: u64) {}
}
