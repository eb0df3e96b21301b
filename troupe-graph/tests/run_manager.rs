use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use troupe_graph::{
    node_fn, CompiledGraph, ExecutionOptions, GraphBuilder, GraphError, GraphState,
    InMemoryCheckpointer, Observer,
    RunHandle, RunManager, RunStatus, StateSchema, StateUpdate, TroupeError, END,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, StateSchema)]
struct ReportState {
    topic: String,
    report: String,
}

fn writer(fail: bool) -> CompiledGraph<ReportState> {
    GraphBuilder::new()
        .add_node(
            "write",
            node_fn(move |state: GraphState<ReportState>| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                if fail {
                    return Err(TroupeError::collaborator("llm", "rate limited"));
                }
                Ok::<_, TroupeError>(StateUpdate::new(
                    ReportStateUpdate::default().report(format!("report on {}", state.data.topic)),
                ))
            }),
        )
        .set_entry("write")
        .add_edge("write", END)
        .with_checkpointer(InMemoryCheckpointer::default())
        .compile()
        .unwrap()
}

fn topic(value: &str) -> StateUpdate<ReportState> {
    StateUpdate::new(ReportStateUpdate::default().topic(value.to_string()))
}

#[tokio::test(start_paused = true)]
async fn submitted_run_completes_in_the_background() {
    let manager = RunManager::new(writer(false));
    let handle = manager.submit("desk-1", topic("tides")).unwrap();
    assert_eq!(handle.thread_id, "desk-1");

    // Nothing has been polled yet.
    assert_eq!(manager.status(&handle).unwrap(), RunStatus::Pending);
    let err = manager.result(&handle).unwrap_err();
    assert!(matches!(
        err,
        GraphError::RunNotFinished {
            status: RunStatus::Pending
        }
    ));

    let state = manager.wait(&handle).await.unwrap();
    assert_eq!(state.data.report, "report on tides");
    assert_eq!(manager.status(&handle).unwrap(), RunStatus::Completed);
    assert_eq!(manager.result(&handle).unwrap(), state);
}

#[tokio::test(start_paused = true)]
async fn failed_run_reports_its_error() {
    let manager = RunManager::new(writer(true));
    let handle = manager.submit("desk-2", topic("storms")).unwrap();

    let err = manager.wait(&handle).await.unwrap_err();
    match err {
        GraphError::RunFailed { message } => assert!(message.contains("rate limited")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(manager.status(&handle).unwrap(), RunStatus::Failed);
}

#[tokio::test]
async fn cancelled_run_fails() {
    let manager = RunManager::new(writer(false));
    let handle = manager.submit("desk-3", topic("winds")).unwrap();
    manager.cancel(&handle).unwrap();

    let err = manager.wait(&handle).await.unwrap_err();
    match err {
        GraphError::RunFailed { message } => assert!(message.contains("cancelled")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(manager.status(&handle).unwrap(), RunStatus::Failed);
}

#[tokio::test]
async fn unknown_run_is_not_found() {
    let manager = RunManager::new(writer(false));
    let handle = RunHandle {
        run_id: "missing".to_string(),
        thread_id: "nowhere".to_string(),
    };
    assert!(matches!(
        manager.status(&handle),
        Err(GraphError::RunNotFound(ref id)) if id == "missing"
    ));
    assert!(matches!(manager.result(&handle), Err(GraphError::RunNotFound(_))));
    assert!(matches!(manager.cancel(&handle), Err(GraphError::RunNotFound(_))));
}

fn broken_router() -> CompiledGraph<ReportState> {
    GraphBuilder::new()
        .add_node(
            "write",
            node_fn(|_state: GraphState<ReportState>| async move {
                Ok::<_, TroupeError>(StateUpdate::new(
                    ReportStateUpdate::default().report("draft".to_string()),
                ))
            }),
        )
        .set_entry("write")
        .add_conditional_edge(
            "write",
            |_: &GraphState<ReportState>| -> &'static str { panic!("router bug") },
            [END],
        )
        .compile()
        .unwrap()
}

#[tokio::test]
async fn panicking_router_fails_the_run() {
    let brief = GraphState::new(ReportState {
        topic: "tides".to_string(),
        ..Default::default()
    });
    let err = broken_router().invoke(brief).await.unwrap_err();
    match err {
        GraphError::RouterPanicked { ref node, ref message } => {
            assert_eq!(node, "write");
            assert!(message.contains("router bug"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.node(), Some("write"));

    let manager = RunManager::new(broken_router());
    let handle = manager.submit("desk-4", topic("tides")).unwrap();
    let err = manager.wait(&handle).await.unwrap_err();
    match err {
        GraphError::RunFailed { message } => assert!(message.contains("router bug")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(manager.status(&handle).unwrap(), RunStatus::Failed);
    assert!(matches!(
        manager.result(&handle),
        Err(GraphError::RunFailed { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn forgotten_run_is_removed() {
    let manager = RunManager::new(writer(false));
    let handle = manager.submit("desk-5", topic("currents")).unwrap();

    assert!(matches!(
        manager.forget(&handle),
        Err(GraphError::RunNotFinished { .. })
    ));
    assert_eq!(manager.len(), 1);

    manager.wait(&handle).await.unwrap();
    let state = manager.forget(&handle).unwrap();
    assert_eq!(state.data.report, "report on currents");
    assert!(manager.is_empty());
    assert!(matches!(manager.status(&handle), Err(GraphError::RunNotFound(_))));
    assert!(matches!(manager.forget(&handle), Err(GraphError::RunNotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn forgetting_a_failed_run_returns_its_error() {
    let manager = RunManager::new(writer(true));
    let handle = manager.submit("desk-6", topic("storms")).unwrap();
    manager.wait(&handle).await.ok();

    assert!(matches!(
        manager.forget(&handle),
        Err(GraphError::RunFailed { ref message }) if message.contains("rate limited")
    ));
    assert!(manager.is_empty());
}

struct FaultyObserver;

#[async_trait::async_trait]
impl Observer for FaultyObserver {
    async fn on_checkpoint_saved(&self, _thread_id: &str, _step: u64) {
        panic!("observer bug");
    }
}

#[tokio::test(start_paused = true)]
async fn panicking_run_is_recorded_as_failed() {
    let manager = RunManager::new(writer(false));
    let options = ExecutionOptions {
        observer: Some(Arc::new(FaultyObserver)),
        ..Default::default()
    };
    let handle = manager
        .submit_with_options("desk-7", topic("tides"), options)
        .unwrap();

    let err = manager.wait(&handle).await.unwrap_err();
    match err {
        GraphError::RunFailed { message } => assert!(message.contains("observer bug")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(manager.status(&handle).unwrap(), RunStatus::Failed);
    assert!(matches!(
        manager.result(&handle),
        Err(GraphError::RunFailed { .. })
    ));
}
