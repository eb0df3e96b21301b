use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use troupe_graph::{
    Checkpointer, CompiledGraph, ExecutionOptions, FileCheckpointer, GraphBuilder, GraphContext,
    GraphError, GraphNode, GraphState, HistoryCheckpointer, InMemoryCheckpointer, StateSchema,
    StateUpdate, TroupeError, END,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, StateSchema)]
struct JobState {
    #[reducer(append)]
    log: Vec<String>,
    request: String,
}

/// Side-effect counter shared by every graph instance of a test.
#[derive(Clone, Default)]
struct Invocations(Arc<std::sync::Mutex<HashMap<String, usize>>>);

impl Invocations {
    fn count(&self, node: &str) -> usize {
        self.0.lock().unwrap().get(node).copied().unwrap_or(0)
    }
}

struct Stage {
    invocations: Invocations,
    fail_once: Option<Arc<AtomicUsize>>,
}

#[async_trait::async_trait]
impl GraphNode<JobState> for Stage {
    async fn invoke_with_context(
        &self,
        _input: GraphState<JobState>,
        context: &GraphContext,
    ) -> Result<StateUpdate<JobState>, TroupeError> {
        *self
            .invocations
            .0
            .lock()
            .unwrap()
            .entry(context.node_id.clone())
            .or_default() += 1;
        if let Some(remaining) = &self.fail_once {
            let consumed = remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if consumed {
                return Err(TroupeError::collaborator("worker", "crashed"));
            }
        }
        Ok(StateUpdate::new(
            JobStateUpdate::default().log(vec![context.node_id.clone()]),
        ))
    }
}

const STAGES: [&str; 5] = ["s1", "s2", "s3", "s4", "s5"];

fn pipeline<C>(checkpointer: C, invocations: &Invocations) -> CompiledGraph<JobState>
where
    C: Checkpointer<JobState> + 'static,
{
    let mut builder = GraphBuilder::new();
    for stage in STAGES {
        builder = builder.add_node(
            stage,
            Stage {
                invocations: invocations.clone(),
                fail_once: None,
            },
        );
    }
    builder
        .set_entry("s1")
        .add_edge("s1", "s2")
        .add_edge("s2", "s3")
        .add_edge("s3", "s4")
        .add_edge("s4", "s5")
        .add_edge("s5", END)
        .with_checkpointer(checkpointer)
        .compile()
        .unwrap()
}

#[tokio::test]
async fn resume_after_crash_runs_only_remaining_supersteps() {
    let dir = tempfile::tempdir().unwrap();
    let invocations = Invocations::default();

    // First process: stops after two committed supersteps.
    let first = pipeline(FileCheckpointer::new(dir.path()), &invocations);
    let err = first
        .invoke_thread_with_options(
            "job-1",
            StateUpdate::new(JobStateUpdate::default().request("build".to_string())),
            ExecutionOptions {
                max_steps: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::MaxStepsExceeded { max: 2 }));
    drop(first);

    // Second process: a fresh graph over the same store.
    let second = pipeline(FileCheckpointer::new(dir.path()), &invocations);
    let pending = second.latest_checkpoint("job-1").await.unwrap().unwrap();
    assert_eq!(pending.step, 2);
    assert_eq!(pending.queue, vec!["s3"]);

    let result = second.resume("job-1").await.unwrap();
    assert_eq!(result.data.log, STAGES.to_vec());
    assert_eq!(result.data.request, "build");
    for stage in STAGES {
        assert_eq!(invocations.count(stage), 1, "{stage} ran more than once");
    }

    let done = second.latest_checkpoint("job-1").await.unwrap().unwrap();
    assert!(done.is_complete());
    assert_eq!(done.step, 5);
    let history =
        HistoryCheckpointer::<JobState>::list_checkpoints(&FileCheckpointer::new(dir.path()), "job-1")
            .await
            .unwrap();
    assert_eq!(
        history.iter().map(|meta| meta.step).collect::<Vec<_>>(),
        vec![1, 2, 3, 4, 5]
    );
}

#[tokio::test]
async fn resubmitting_a_failed_thread_resumes_instead_of_restarting() {
    let invocations = Invocations::default();
    let remaining_failures = Arc::new(AtomicUsize::new(1));
    let graph = GraphBuilder::new()
        .add_node(
            "fetch",
            Stage {
                invocations: invocations.clone(),
                fail_once: None,
            },
        )
        .add_node(
            "flaky",
            Stage {
                invocations: invocations.clone(),
                fail_once: Some(remaining_failures),
            },
        )
        .set_entry("fetch")
        .add_edge("fetch", "flaky")
        .add_edge("flaky", END)
        .with_checkpointer(InMemoryCheckpointer::default())
        .compile()
        .unwrap();

    let input = StateUpdate::new(JobStateUpdate::default().request("first".to_string()));
    let err = graph.invoke_thread("job-2", input).await.unwrap_err();
    assert_eq!(err.node(), Some("flaky"));

    // The new input is ignored while the thread has a pending run.
    let input = StateUpdate::new(JobStateUpdate::default().request("second".to_string()));
    let result = graph.invoke_thread("job-2", input).await.unwrap();
    assert_eq!(result.data.request, "first");
    assert_eq!(result.data.log, vec!["fetch", "flaky"]);
    assert_eq!(invocations.count("fetch"), 1);
    assert_eq!(invocations.count("flaky"), 2);
}

#[tokio::test]
async fn completed_thread_continues_from_stored_state() {
    let invocations = Invocations::default();
    let graph = pipeline(InMemoryCheckpointer::default(), &invocations);

    graph
        .invoke_thread("chat", StateUpdate::empty())
        .await
        .unwrap();
    let input = StateUpdate::new(JobStateUpdate::default().request("again".to_string()));
    let result = graph.invoke_thread("chat", input).await.unwrap();

    assert_eq!(result.data.log.len(), 10);
    assert_eq!(result.data.request, "again");
    let checkpoint = graph.latest_checkpoint("chat").await.unwrap().unwrap();
    assert_eq!(checkpoint.step, 10);

    let err = graph.resume("chat").await.unwrap_err();
    assert!(matches!(err, GraphError::NothingToResume { ref thread_id } if thread_id == "chat"));
    let err = graph.resume("never-started").await.unwrap_err();
    assert!(matches!(err, GraphError::NothingToResume { .. }));
}

#[tokio::test]
async fn threads_do_not_interfere() {
    let invocations = Invocations::default();
    let graph = pipeline(InMemoryCheckpointer::default(), &invocations);

    let (a, b) = tokio::join!(
        graph.invoke_thread(
            "a",
            StateUpdate::new(JobStateUpdate::default().request("for a".to_string()))
        ),
        graph.invoke_thread(
            "b",
            StateUpdate::new(JobStateUpdate::default().request("for b".to_string()))
        ),
    );
    assert_eq!(a.unwrap().data.request, "for a");
    assert_eq!(b.unwrap().data.request, "for b");

    let a = graph.latest_checkpoint("a").await.unwrap().unwrap();
    let b = graph.latest_checkpoint("b").await.unwrap().unwrap();
    assert_eq!(a.state.data.request, "for a");
    assert_eq!(b.state.data.request, "for b");
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(invocations.count("s1"), 2);
}

#[tokio::test]
async fn file_checkpointer_keeps_sanitized_threads_apart() {
    let dir = tempfile::tempdir().unwrap();
    let invocations = Invocations::default();
    let graph = pipeline(FileCheckpointer::new(dir.path()), &invocations);

    graph
        .invoke_thread("team/a", StateUpdate::empty())
        .await
        .unwrap();
    assert!(graph.latest_checkpoint("team_a").await.unwrap().is_none());
    assert!(dir.path().join("team_a.jsonl").exists());
    assert!(graph.latest_checkpoint("team/a").await.unwrap().is_some());
}
