//! Research sub-graph: search, judge coverage, optionally search once more,
//! then summarise.

use serde::{Deserialize, Serialize};
use serde_json::json;
use troupe_core::{
    GraphState, KeywordVerdictParser, OutputParser, StateSchema, StateUpdate, TroupeError,
    Verdict,
};
use troupe_graph::{
    CompiledGraph, GraphBuilder, GraphContext, GraphNode, RevisionBound, END,
};

use crate::message::ChatMessage;
use crate::{prompts, PipelineConfig, PipelineDeps, PipelineError};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, StateSchema)]
pub struct ResearchState {
    pub topic: String,
    #[reducer(append)]
    pub logs: Vec<ChatMessage>,
    pub raw_data: String,
    pub quality: Verdict,
    pub retry_count: u32,
    pub run_label: String,
}

pub(crate) const SEARCH_UNAVAILABLE: &str = "search is unavailable";

/// Runs a search and flattens the hits. Search problems never fail the
/// node; they become part of the collected text.
pub(crate) async fn search_text(deps: &PipelineDeps, query: &str, bullets: bool) -> String {
    let Some(search) = &deps.search else {
        return SEARCH_UNAVAILABLE.to_string();
    };
    match search.search(query).await {
        Ok(hits) => hits
            .iter()
            .map(|hit| {
                if bullets {
                    format!("- {}", hit.content)
                } else {
                    hit.content.clone()
                }
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Err(error) => {
            tracing::warn!(%error, query, "search failed");
            format!("search failed: {error}")
        }
    }
}

struct Execute {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for Execute {
    async fn invoke_with_context(
        &self,
        input: GraphState<ResearchState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<ResearchState>, TroupeError> {
        let topic = &input.data.topic;
        tracing::info!(topic = %topic, "collecting research");
        let content = search_text(&self.deps, topic, false).await;
        let log = ChatMessage::assistant(
            "researcher",
            format!("search finished: {} chars", content.chars().count()),
        );
        Ok(StateUpdate::new(
            ResearchStateUpdate::default()
                .raw_data(content)
                .logs(vec![log]),
        ))
    }
}

struct Reflect {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for Reflect {
    async fn invoke_with_context(
        &self,
        input: GraphState<ResearchState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<ResearchState>, TroupeError> {
        let state = &input.data;
        let evaluation = self
            .deps
            .generator
            .generate(prompts::research_reflect(&state.topic, &state.raw_data))
            .await?;
        let quality = KeywordVerdictParser.parse(&evaluation)?;
        tracing::info!(?quality, "research evaluated");
        let log = ChatMessage::assistant("evaluator", format!("evaluation: {quality:?}"));
        Ok(StateUpdate::new(
            ResearchStateUpdate::default()
                .quality(quality)
                .logs(vec![log]),
        ))
    }
}

struct Revise {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for Revise {
    async fn invoke_with_context(
        &self,
        input: GraphState<ResearchState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<ResearchState>, TroupeError> {
        let state = &input.data;
        let query = self
            .deps
            .generator
            .generate(prompts::research_follow_up_query(&state.topic, &state.raw_data))
            .await?;
        let query = query.trim().to_string();
        tracing::info!(query = %query, "running follow-up search");
        let extra = search_text(&self.deps, &query, true).await;
        let combined = format!(
            "{}\n\n[follow-up search ({query})]:\n{extra}",
            state.raw_data
        );
        let log = ChatMessage::assistant("researcher", format!("follow-up search: {query}"));
        Ok(StateUpdate::new(
            ResearchStateUpdate::default()
                .raw_data(combined)
                .retry_count(state.retry_count + 1)
                .logs(vec![log]),
        ))
    }
}

struct Submit {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<ResearchState> for Submit {
    async fn invoke_with_context(
        &self,
        input: GraphState<ResearchState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<ResearchState>, TroupeError> {
        let state = &input.data;
        let summary = self
            .deps
            .generator
            .generate(prompts::research_summary(&state.topic, &state.raw_data))
            .await?;
        self.deps
            .record(&state.run_label, "Research_Done", json!({ "summary": summary }))
            .await;
        Ok(StateUpdate::new(
            ResearchStateUpdate::default().raw_data(summary),
        ))
    }
}

/// `execute → reflect → (revise →) submit → END`. The follow-up search runs
/// while the verdict is `Fail` and `research_retry_bound` is not spent.
pub fn research_graph(
    deps: &PipelineDeps,
    config: &PipelineConfig,
) -> Result<CompiledGraph<ResearchState>, PipelineError> {
    let bound = RevisionBound::new(config.research_retry_bound);
    let graph = GraphBuilder::new()
        .add_node("execute", Execute { deps: deps.clone() })
        .add_node("reflect", Reflect { deps: deps.clone() })
        .add_node("revise", Revise { deps: deps.clone() })
        .add_node("submit", Submit { deps: deps.clone() })
        .set_entry("execute")
        .add_edge("execute", "reflect")
        .add_conditional_edge(
            "reflect",
            move |state: &GraphState<ResearchState>| {
                bound.route(
                    state.data.quality.is_pass(),
                    state.data.retry_count,
                    "revise",
                    "submit",
                )
            },
            ["revise", "submit"],
        )
        .add_edge("revise", "submit")
        .add_edge("submit", END)
        .compile()?;
    Ok(graph)
}
