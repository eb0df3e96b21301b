use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use troupe_core::{GraphState, ReducerKind, StateSchema, StateUpdate};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, troupe_macros::StateSchema)]
struct ReportState {
    task: String,
    #[reducer(append)]
    messages: Vec<String>,
    #[reducer(merge)]
    agent_results: BTreeMap<String, String>,
    #[reducer(union)]
    tags: HashSet<String>,
    #[reducer(replace)]
    revision_count: u32,
}

#[test]
fn derive_declares_fields_in_order() {
    let fields = ReportState::fields();
    let keys: Vec<_> = fields.iter().map(|f| f.key).collect();
    assert_eq!(
        keys,
        vec!["task", "messages", "agent_results", "tags", "revision_count"]
    );
    assert_eq!(ReportState::reducer_for("messages"), ReducerKind::Append);
    assert_eq!(ReportState::reducer_for("agent_results"), ReducerKind::ShallowMerge);
    assert_eq!(ReportState::reducer_for("tags"), ReducerKind::Union);
    assert_eq!(ReportState::reducer_for("task"), ReducerKind::Replace);
    assert_eq!(ReportState::reducer_for("missing"), ReducerKind::Replace);
}

#[test]
fn derived_update_only_touches_written_keys() {
    let current = ReportState {
        task: "write docs".into(),
        messages: vec!["hello".into()],
        agent_results: BTreeMap::from([("research".into(), "notes".into())]),
        tags: HashSet::from(["a".to_string()]),
        revision_count: 1,
    };

    let update = ReportStateUpdate::default()
        .messages(vec!["world".into()])
        .agent_results(BTreeMap::from([("code".into(), "fn main() {}".into())]))
        .tags(HashSet::from(["a".to_string(), "b".to_string()]));
    assert_eq!(update.written_keys(), vec!["messages", "agent_results", "tags"]);

    let next = ReportState::apply(&current, update);
    assert_eq!(next.task, "write docs");
    assert_eq!(next.revision_count, 1);
    assert_eq!(next.messages, vec!["hello", "world"]);
    assert_eq!(next.agent_results.len(), 2);
    assert_eq!(next.agent_results["research"], "notes");
    assert_eq!(next.tags.len(), 2);
}

#[test]
fn derived_update_serializes_only_present_keys() {
    let update = ReportStateUpdate::default().revision_count(2);
    let json = serde_json::to_value(&update).unwrap();
    assert_eq!(json, serde_json::json!({ "revision_count": 2 }));

    let back: ReportStateUpdate = serde_json::from_value(json).unwrap();
    assert_eq!(back.revision_count, Some(2));
    assert!(back.task.is_none());
}

#[test]
fn state_update_reports_keys_through_schema() {
    let update: StateUpdate<ReportState> =
        StateUpdate::new(ReportStateUpdate::default().task("new".into()));
    assert_eq!(update.keys(), vec!["task"]);

    let state = GraphState::new(ReportState::default()).apply(update);
    assert_eq!(state.data.task, "new");
}
