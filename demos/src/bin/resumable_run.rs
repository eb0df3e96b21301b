//! Interrupts a document run after two supersteps, then resumes it from a
//! SQLite checkpoint with a freshly built graph, as a restarted process
//! would.
//!
//! `TROUPE_DB_URL` picks the database (default: a file in the temp dir).

use std::sync::Arc;

use troupe_checkpoint_sqlite::SqliteCheckpointer;
use troupe_demos::{CannedGenerator, CannedSearch};
use troupe_graph::{CompiledGraph, ExecutionOptions, GraphError};
use troupe_pipelines::{
    main_graph_builder, request, GeneratorPolicy, MainState, PipelineConfig, PipelineDeps,
};

const THREAD: &str = "resumable-doc";

async fn open(database_url: &str) -> anyhow::Result<SqliteCheckpointer> {
    Ok(SqliteCheckpointer::builder(database_url).build().await?)
}

fn build(checkpointer: SqliteCheckpointer) -> anyhow::Result<CompiledGraph<MainState>> {
    let config = PipelineConfig::from_env()?;
    let generator = Arc::new(CannedGenerator::default());
    let deps = PipelineDeps::new(generator.clone()).with_search(Arc::new(CannedSearch));
    let graph = main_graph_builder(&deps, &config, Arc::new(GeneratorPolicy::new(generator)))?
        .with_checkpointer(checkpointer)
        .compile()?;
    Ok(graph)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    troupe_demos::init();

    let database_url = std::env::var("TROUPE_DB_URL").unwrap_or_else(|_| {
        let path = std::env::temp_dir().join("troupe-resumable-demo.db");
        format!("sqlite://{}", path.display())
    });

    let store = open(&database_url).await?;
    let removed = store.clear(THREAD).await?;
    tracing::info!(removed, "cleared previous checkpoints");

    let first = build(store)?;
    let err = first
        .invoke_thread_with_options(
            THREAD,
            request("Explain binary search with an example program", ""),
            ExecutionOptions {
                max_steps: Some(2),
                ..Default::default()
            },
        )
        .await
        .err();
    match err {
        Some(GraphError::MaxStepsExceeded { max }) => {
            tracing::info!(max, "stopped early on purpose");
        }
        Some(other) => return Err(other.into()),
        None => anyhow::bail!("run finished before the step limit"),
    }
    drop(first);

    let second = build(open(&database_url).await?)?;
    if let Some(pending) = second.latest_checkpoint(THREAD).await? {
        tracing::info!(step = pending.step, queue = ?pending.queue, "pending superstep");
    }
    let state = second.resume(THREAD).await?;
    for (key, value) in &state.data.agent_results {
        println!("== {key} ==\n{value}\n");
    }
    Ok(())
}
