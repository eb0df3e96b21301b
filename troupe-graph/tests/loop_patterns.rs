use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use troupe_graph::{
    node_fn, ExecutionConfig, ExecutionOptions, GraphBuilder, GraphError, GraphState,
    RevisionBound, StateSchema, StateUpdate, TroupeError, END,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, StateSchema)]
struct DraftState {
    passes: u32,
    revisions: u32,
    passed: bool,
    submitted: bool,
}

const BOUND: RevisionBound = RevisionBound::new(3);

#[tokio::test]
async fn bounded_revision_cycle_stops_after_n_plus_one_passes() {
    let graph = GraphBuilder::new()
        .add_node(
            "execute",
            node_fn(|state: GraphState<DraftState>| async move {
                Ok::<_, TroupeError>(StateUpdate::new(
                    DraftStateUpdate::default().passes(state.data.passes + 1),
                ))
            }),
        )
        .add_node(
            "reflect",
            // The reviewer never approves.
            node_fn(|_state: GraphState<DraftState>| async move {
                Ok::<_, TroupeError>(StateUpdate::new(DraftStateUpdate::default().passed(false)))
            }),
        )
        .add_node(
            "revise",
            node_fn(|state: GraphState<DraftState>| async move {
                Ok::<_, TroupeError>(StateUpdate::new(
                    DraftStateUpdate::default().revisions(state.data.revisions + 1),
                ))
            }),
        )
        .add_node(
            "submit",
            node_fn(|_state: GraphState<DraftState>| async move {
                Ok::<_, TroupeError>(StateUpdate::new(DraftStateUpdate::default().submitted(true)))
            }),
        )
        .set_entry("execute")
        .add_edge("execute", "reflect")
        .add_conditional_edge(
            "reflect",
            |state: &GraphState<DraftState>| {
                BOUND.route(state.data.passed, state.data.revisions, "revise", "submit")
            },
            ["revise", "submit"],
        )
        .add_edge("revise", "execute")
        .add_edge("submit", END)
        .compile()
        .unwrap();

    let result = graph.invoke(GraphState::default()).await.unwrap();
    assert_eq!(result.data.passes, BOUND.max_passes());
    assert_eq!(result.data.passes, 4);
    assert_eq!(result.data.revisions, 3);
    assert!(result.data.submitted);
}

#[tokio::test]
async fn unbounded_cycle_is_only_stopped_by_an_explicit_step_limit() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let graph = GraphBuilder::new()
        .add_node(
            "spin",
            node_fn(move |state: GraphState<DraftState>| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TroupeError>(StateUpdate::new(
                        DraftStateUpdate::default().passes(state.data.passes + 1),
                    ))
                }
            }),
        )
        .set_entry("spin")
        // Declares END, but the router never picks it.
        .add_conditional_edge("spin", |_: &GraphState<DraftState>| "spin", ["spin", END])
        .with_default_config(ExecutionConfig {
            max_steps: Some(50),
            ..Default::default()
        })
        .compile()
        .unwrap();

    let err = graph
        .invoke_with_options(
            GraphState::default(),
            ExecutionOptions {
                max_steps: Some(10),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::MaxStepsExceeded { max: 10 }));
    assert_eq!(calls.load(Ordering::SeqCst), 10);

    let err = graph.invoke(GraphState::default()).await.unwrap_err();
    assert!(matches!(err, GraphError::MaxStepsExceeded { max: 50 }));
}

#[tokio::test]
async fn no_step_limit_by_default() {
    let graph = GraphBuilder::new()
        .add_node(
            "count",
            node_fn(|state: GraphState<DraftState>| async move {
                Ok::<_, TroupeError>(StateUpdate::new(
                    DraftStateUpdate::default().passes(state.data.passes + 1),
                ))
            }),
        )
        .set_entry("count")
        .add_conditional_edge(
            "count",
            |state: &GraphState<DraftState>| if state.data.passes >= 500 { END } else { "count" },
            ["count", END],
        )
        .compile()
        .unwrap();

    assert!(graph.default_config().max_steps.is_none());
    let result = graph.invoke(GraphState::default()).await.unwrap();
    assert_eq!(result.data.passes, 500);
}
