//! Runs the full document pipeline in the background and reports progress
//! through an observer.
//!
//! ```sh
//! RUST_LOG=info,troupe_graph=debug cargo run -p troupe-demos --bin document_pipeline
//! ```
//!
//! Set `TROUPE_ARTIFACT_DIR` to keep every step's output on disk.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use troupe_demos::{CannedGenerator, CannedSearch};
use troupe_graph::{ExecutionOptions, GraphError, Observer, RunManager};
use troupe_pipelines::supervisor::FINAL_DOC_KEY;
use troupe_pipelines::{main_graph, request, GeneratorPolicy, PipelineConfig, PipelineDeps};

struct ProgressLog;

#[async_trait::async_trait]
impl Observer for ProgressLog {
    async fn on_node_end(&self, node_id: &str, _output: &Value, duration_ms: u128) {
        tracing::info!(node = node_id, duration_ms, "node finished");
    }

    async fn on_error(&self, node_id: &str, error: &GraphError) {
        tracing::error!(node = node_id, %error, "node failed");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    troupe_demos::init();

    let config = PipelineConfig::from_env().context("reading TROUPE_* settings")?;
    let generator = Arc::new(CannedGenerator::default());
    let deps = PipelineDeps::new(generator.clone())
        .with_search(Arc::new(CannedSearch))
        .with_config_artifacts(&config);
    let graph = main_graph(&deps, &config, Arc::new(GeneratorPolicy::new(generator)))?;

    let runs = RunManager::new(graph);
    let handle = runs.submit_with_options(
        "binary-search-doc",
        request(
            "Explain binary search with an example program",
            "binary_search",
        ),
        ExecutionOptions {
            observer: Some(Arc::new(ProgressLog)),
            ..Default::default()
        },
    )?;
    tracing::info!(run_id = %handle.run_id, status = ?runs.status(&handle)?, "submitted");

    let state = runs.wait(&handle).await?;
    let document = state
        .data
        .agent_results
        .get(FINAL_DOC_KEY)
        .context("run finished without a document")?;
    println!("{document}");
    Ok(())
}
