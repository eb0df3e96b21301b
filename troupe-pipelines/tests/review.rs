mod common;

use std::sync::Arc;

use common::*;
use troupe_core::{FileArtifactSink, GraphState, StepRecord, Verdict};
use troupe_pipelines::{code_graph, design_graph, PipelineConfig, PipelineDeps, ReviewState};

fn topic(text: &str) -> GraphState<ReviewState> {
    GraphState::new(ReviewState {
        topic: text.to_string(),
        ..Default::default()
    })
}

#[tokio::test]
async fn failing_code_is_revised_until_the_bound() {
    let generator = ScriptedGenerator::new()
        .on(CODE_DRAFT, ["print('v0')"])
        .on(CODE_REVIEW, ["STATUS: FAIL\nFEEDBACK: add comments"])
        .on(REVISE, ["print('v1')", "print('v2')", "print('v3')"]);
    let deps = PipelineDeps::new(generator.clone());
    let graph = code_graph(&deps, &PipelineConfig::default()).unwrap();

    let result = graph.invoke(topic("binary search")).await.unwrap();

    assert_eq!(generator.count(CODE_DRAFT), 1);
    assert_eq!(generator.count(CODE_REVIEW), 4);
    assert_eq!(generator.count(REVISE), 3);
    assert_eq!(result.data.retry_count, 3);
    assert_eq!(result.data.quality, Verdict::Fail);
    assert_eq!(result.data.artifact, "print('v3')");
    assert!(generator.prompts(REVISE)[0].contains("add comments"));
}

#[tokio::test]
async fn passing_design_ends_after_one_review() {
    let generator = ScriptedGenerator::new()
        .on(DESIGN_DRAFT, ["graph TD; A-->B"])
        .on(DESIGN_REVIEW, ["STATUS: PASS\nFEEDBACK: clear"]);
    let deps = PipelineDeps::new(generator.clone());
    let graph = design_graph(&deps, &PipelineConfig::default()).unwrap();

    let result = graph.invoke(topic("request lifecycle")).await.unwrap();

    assert_eq!(result.data.quality, Verdict::Pass);
    assert_eq!(result.data.retry_count, 0);
    assert_eq!(result.data.artifact, "graph TD; A-->B");
    assert_eq!(generator.count(REVISE), 0);
}

#[tokio::test]
async fn unreadable_review_counts_as_a_failure() {
    let generator = ScriptedGenerator::new()
        .on(CODE_DRAFT, ["x = 1"])
        .on(CODE_REVIEW, ["", "STATUS: PASS"])
        .on(REVISE, ["x = 2"]);
    let deps = PipelineDeps::new(generator.clone());
    let result = code_graph(&deps, &PipelineConfig::default())
        .unwrap()
        .invoke(topic("variables"))
        .await
        .unwrap();

    assert_eq!(generator.count(REVISE), 1);
    assert_eq!(result.data.quality, Verdict::Pass);
    assert_eq!(result.data.artifact, "x = 2");
}

#[tokio::test]
async fn first_artifact_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let sink = FileArtifactSink::new(dir.path());
    let generator = ScriptedGenerator::new()
        .on(DESIGN_DRAFT, ["sequenceDiagram"])
        .on(DESIGN_REVIEW, ["STATUS: PASS"]);
    let deps = PipelineDeps::new(generator).with_artifacts(Arc::new(sink.clone()));
    let mut input = topic("handshake");
    input.data.run_label = "design-run".to_string();
    design_graph(&deps, &PipelineConfig::default())
        .unwrap()
        .invoke(input)
        .await
        .unwrap();

    let entries: Vec<_> = std::fs::read_dir(sink.run_dir("design-run"))
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(entries.len(), 1);
    let record: StepRecord =
        serde_json::from_str(&std::fs::read_to_string(&entries[0]).unwrap()).unwrap();
    assert_eq!(record.step_name, "Design_Done");
    assert_eq!(record.result["design"], "sequenceDiagram");
}
