//! Writer sub-graph: draft, score, redraft until the score clears the bar
//! or the draft budget is spent.

use serde::{Deserialize, Serialize};
use serde_json::json;
use troupe_core::{
    GraphState, OutputParser, ScoreFeedbackParser, ScoredReview, StateSchema, StateUpdate,
    TroupeError,
};
use troupe_graph::{CompiledGraph, GraphBuilder, GraphContext, GraphNode, RevisionBound, END};

use crate::message::ChatMessage;
use crate::{prompts, PipelineConfig, PipelineDeps, PipelineError};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, StateSchema)]
pub struct WriterState {
    pub topic: String,
    pub research_data: String,
    pub code_data: String,
    pub design_data: String,
    pub draft: String,
    pub critique: String,
    pub score: f64,
    /// Drafts written so far.
    pub revision_count: u32,
    #[reducer(append)]
    pub logs: Vec<ChatMessage>,
    pub run_label: String,
}

struct Execute {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<WriterState> for Execute {
    async fn invoke_with_context(
        &self,
        input: GraphState<WriterState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<WriterState>, TroupeError> {
        let state = &input.data;
        let version = state.revision_count + 1;
        tracing::info!(version, "writing draft");
        let draft = self
            .deps
            .generator
            .generate(prompts::writer_draft(
                &state.topic,
                &state.research_data,
                &state.code_data,
                &state.design_data,
                &state.critique,
            ))
            .await?;
        self.deps
            .record(&state.run_label, "Write_Done", json!({ "final_draft": draft }))
            .await;
        Ok(StateUpdate::new(
            WriterStateUpdate::default()
                .draft(draft)
                .revision_count(version)
                .logs(vec![ChatMessage::assistant(
                    "writer",
                    format!("draft v{version} written"),
                )]),
        ))
    }
}

struct Reflect {
    deps: PipelineDeps,
    fallback_score: f64,
}

#[async_trait::async_trait]
impl GraphNode<WriterState> for Reflect {
    async fn invoke_with_context(
        &self,
        input: GraphState<WriterState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<WriterState>, TroupeError> {
        let state = &input.data;
        let response = self
            .deps
            .generator
            .generate(prompts::writer_review(&state.topic, &state.draft))
            .await?;
        let fallback = ScoredReview {
            score: self.fallback_score,
            ..ScoredReview::fallback()
        };
        let review = ScoreFeedbackParser.with_fallback(fallback).parse(&response);
        tracing::info!(score = review.score, "draft scored");
        let log = ChatMessage::assistant(
            "critic",
            format!("score {} / {}", review.score, review.feedback),
        );
        Ok(StateUpdate::new(
            WriterStateUpdate::default()
                .score(review.score)
                .critique(review.feedback)
                .logs(vec![log]),
        ))
    }
}

/// `execute → reflect → (execute | END)`. Ends once the score reaches
/// `writer_pass_score` or `writer_revision_bound` drafts exist.
pub fn writer_graph(
    deps: &PipelineDeps,
    config: &PipelineConfig,
) -> Result<CompiledGraph<WriterState>, PipelineError> {
    let bound = RevisionBound::passes(config.writer_revision_bound);
    let pass_score = config.writer_pass_score;
    let graph = GraphBuilder::new()
        .add_node("execute", Execute { deps: deps.clone() })
        .add_node(
            "reflect",
            Reflect {
                deps: deps.clone(),
                fallback_score: config.fallback_score,
            },
        )
        .set_entry("execute")
        .add_edge("execute", "reflect")
        .add_conditional_edge(
            "reflect",
            move |state: &GraphState<WriterState>| {
                bound.route(
                    state.data.score >= pass_score,
                    state.data.revision_count.saturating_sub(1),
                    "execute",
                    END,
                )
            },
            ["execute", END],
        )
        .compile()?;
    Ok(graph)
}
