use serde::{Deserialize, Serialize};
use troupe_core::{
    Checkpoint, Checkpointer, GraphState, HistoryCheckpointer, InMemoryCheckpointer, StateSchema,
};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, troupe_macros::StateSchema)]
struct Job {
    stage: String,
}

fn at(thread: &str, step: u64, stage: &str, queue: &[&str]) -> Checkpoint<Job> {
    Checkpoint::new(
        thread.to_string(),
        "run-1".to_string(),
        GraphState::new(Job {
            stage: stage.to_string(),
        }),
        step,
        vec![stage.to_string()],
        queue.iter().map(|node| node.to_string()).collect(),
    )
}

#[tokio::test]
async fn load_returns_latest_per_thread() {
    let store = InMemoryCheckpointer::<Job>::default();
    store.save(&at("a", 1, "fetch", &["parse"])).await.unwrap();
    store.save(&at("a", 2, "parse", &[])).await.unwrap();
    store.save(&at("b", 1, "fetch", &["parse"])).await.unwrap();

    let a = store.load("a").await.unwrap().unwrap();
    assert_eq!(a.step, 2);
    assert!(a.is_complete());
    let b = store.load("b").await.unwrap().unwrap();
    assert_eq!(b.state.data.stage, "fetch");
    assert!(!b.is_complete());
    assert!(store.load("c").await.unwrap().is_none());
}

#[tokio::test]
async fn history_is_ordered_and_clearable() {
    let store = InMemoryCheckpointer::<Job>::default();
    for step in 1..=3 {
        store.save(&at("t", step, "loop", &["loop"])).await.unwrap();
    }
    let history = store.list_checkpoints("t").await.unwrap();
    assert_eq!(
        history.iter().map(|meta| (meta.seq, meta.step)).collect::<Vec<_>>(),
        vec![(1, 1), (2, 2), (3, 3)]
    );

    store.clear("t").unwrap();
    assert!(store.list_checkpoints("t").await.unwrap().is_empty());
}

#[test]
fn checkpoint_round_trips_through_json() {
    let checkpoint = at("t", 4, "write", &["review"]);
    let json = serde_json::to_string(&checkpoint).unwrap();
    let back: Checkpoint<Job> = serde_json::from_str(&json).unwrap();
    assert_eq!(back, checkpoint);
    assert_eq!(Job::fields().len(), 1);
}
