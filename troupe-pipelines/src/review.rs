//! Code and design sub-graphs. Both share one shape: draft an artifact,
//! review it, revise until it passes or the retry budget is spent.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;
use troupe_core::{
    GraphState, OutputParser, StateSchema, StateUpdate, StatusLineParser, StatusReview,
    TroupeError, Verdict,
};
use troupe_graph::{CompiledGraph, GraphBuilder, GraphContext, GraphNode, RevisionBound, END};

use crate::message::ChatMessage;
use crate::{prompts, PipelineConfig, PipelineDeps, PipelineError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Code,
    Design,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Code => "code",
            ArtifactKind::Design => "Mermaid diagram",
        }
    }

    fn author(self) -> &'static str {
        match self {
            ArtifactKind::Code => "coder",
            ArtifactKind::Design => "designer",
        }
    }

    /// Artifact step name and the JSON key of its payload.
    fn record_step(self) -> (&'static str, &'static str) {
        match self {
            ArtifactKind::Code => ("Code_Done", "code"),
            ArtifactKind::Design => ("Design_Done", "design"),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, StateSchema)]
pub struct ReviewState {
    pub topic: String,
    #[reducer(append)]
    pub logs: Vec<ChatMessage>,
    pub artifact: String,
    pub critique: String,
    pub quality: Verdict,
    pub retry_count: u32,
    pub run_label: String,
}

struct Execute {
    kind: ArtifactKind,
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<ReviewState> for Execute {
    async fn invoke_with_context(
        &self,
        input: GraphState<ReviewState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<ReviewState>, TroupeError> {
        let state = &input.data;
        tracing::info!(kind = %self.kind, topic = %state.topic, "drafting artifact");
        let artifact = self
            .deps
            .generator
            .generate(prompts::artifact_draft(self.kind, &state.topic))
            .await?;
        let (step, key) = self.kind.record_step();
        let mut payload = serde_json::Map::new();
        payload.insert(key.to_string(), json!(artifact));
        self.deps
            .record(&state.run_label, step, payload.into())
            .await;
        Ok(StateUpdate::new(
            ReviewStateUpdate::default()
                .artifact(artifact)
                .retry_count(0)
                .logs(vec![ChatMessage::assistant(
                    self.kind.author(),
                    format!("{} draft ready", self.kind),
                )]),
        ))
    }
}

struct Reflect {
    kind: ArtifactKind,
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<ReviewState> for Reflect {
    async fn invoke_with_context(
        &self,
        input: GraphState<ReviewState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<ReviewState>, TroupeError> {
        let review_text = self
            .deps
            .generator
            .generate(prompts::artifact_review(self.kind, &input.data.artifact))
            .await?;
        let review = StatusLineParser
            .with_fallback(StatusReview::fallback())
            .parse(&review_text);
        tracing::info!(kind = %self.kind, verdict = ?review.verdict, "artifact reviewed");
        let log = ChatMessage::assistant("reviewer", format!("review: {:?}", review.verdict));
        Ok(StateUpdate::new(
            ReviewStateUpdate::default()
                .quality(review.verdict)
                .critique(review.critique)
                .logs(vec![log]),
        ))
    }
}

struct Revise {
    kind: ArtifactKind,
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<ReviewState> for Revise {
    async fn invoke_with_context(
        &self,
        input: GraphState<ReviewState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<ReviewState>, TroupeError> {
        let state = &input.data;
        let attempt = state.retry_count + 1;
        tracing::info!(kind = %self.kind, attempt, "revising artifact");
        let artifact = self
            .deps
            .generator
            .generate(prompts::artifact_revise(self.kind, &state.artifact, &state.critique))
            .await?;
        Ok(StateUpdate::new(
            ReviewStateUpdate::default()
                .artifact(artifact)
                .retry_count(attempt)
                .logs(vec![ChatMessage::assistant(
                    self.kind.author(),
                    format!("revision {attempt} done"),
                )]),
        ))
    }
}

/// `execute → reflect → (revise → reflect | END)`, bounded by
/// `review_retry_bound` revisions.
pub fn review_graph(
    kind: ArtifactKind,
    deps: &PipelineDeps,
    config: &PipelineConfig,
) -> Result<CompiledGraph<ReviewState>, PipelineError> {
    let bound = RevisionBound::new(config.review_retry_bound);
    let graph = GraphBuilder::new()
        .add_node(
            "execute",
            Execute {
                kind,
                deps: deps.clone(),
            },
        )
        .add_node(
            "reflect",
            Reflect {
                kind,
                deps: deps.clone(),
            },
        )
        .add_node(
            "revise",
            Revise {
                kind,
                deps: deps.clone(),
            },
        )
        .set_entry("execute")
        .add_edge("execute", "reflect")
        .add_conditional_edge(
            "reflect",
            move |state: &GraphState<ReviewState>| {
                bound.route(
                    state.data.quality.is_pass(),
                    state.data.retry_count,
                    "revise",
                    END,
                )
            },
            ["revise", END],
        )
        .add_edge("revise", "reflect")
        .compile()?;
    Ok(graph)
}

pub fn code_graph(
    deps: &PipelineDeps,
    config: &PipelineConfig,
) -> Result<CompiledGraph<ReviewState>, PipelineError> {
    review_graph(ArtifactKind::Code, deps, config)
}

pub fn design_graph(
    deps: &PipelineDeps,
    config: &PipelineConfig,
) -> Result<CompiledGraph<ReviewState>, PipelineError> {
    review_graph(ArtifactKind::Design, deps, config)
}
