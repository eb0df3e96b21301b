//! Scene guide for trip-talk: refine two search queries, run the web and
//! video searches side by side, then compose a phrase guide from both.
//!
//! Every step degrades to a fixed fallback, so building a guide never fails
//! on collaborator trouble. The result feeds [`crate::trip_talk::scene`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use troupe_core::{GraphState, JsonOutputParser, OutputParser, StateSchema, StateUpdate, TroupeError};
use troupe_graph::{CompiledGraph, GraphBuilder, GraphContext, GraphNode, END};

use crate::research::search_text;
use crate::trip_talk::{scene, TripStateUpdate};
use crate::{prompts, PipelineDeps, PipelineError};

pub const NO_VIDEO_CONTEXT: &str = "no video guides found";

/// Phrase guide for one place and situation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Guide {
    pub speaking_expressions: Vec<String>,
    pub listening_expressions: Vec<String>,
    pub focused_vocabulary: Vec<String>,
    pub conversation_flow: Vec<String>,
}

impl Guide {
    /// Used when the guide cannot be generated or parsed.
    pub fn fallback() -> Self {
        let list = |items: &[&str]| items.iter().map(|item| item.to_string()).collect();
        Self {
            speaking_expressions: list(&["I'd like... - (pronunciation) - meaning"]),
            listening_expressions: list(&["For here or to go? - (pronunciation) - meaning"]),
            focused_vocabulary: list(&["Cilantro (coriander)", "Spicy (hot)", "To go (takeaway)"]),
            conversation_flow: list(&[
                "Step 1: [Staff] Hello - (hello) - greeting",
                "Step 2: [Traveller] Hi - (hi) - greeting",
            ]),
        }
    }

    fn is_empty(&self) -> bool {
        self.speaking_expressions.is_empty()
            && self.listening_expressions.is_empty()
            && self.focused_vocabulary.is_empty()
            && self.conversation_flow.is_empty()
    }

    /// Reference material for the trip-talk speakers: `guide`, `menu_text`,
    /// `key_phrases` and the raw web search text.
    pub fn context_data(&self, raw_search: &str) -> BTreeMap<String, Value> {
        let menu_text = if self.focused_vocabulary.is_empty() {
            "No vocab data".to_string()
        } else {
            self.focused_vocabulary.join(", ")
        };
        let key_phrases: Vec<&String> = self
            .speaking_expressions
            .iter()
            .chain(&self.listening_expressions)
            .collect();
        BTreeMap::from([
            ("guide".to_string(), json!(self)),
            ("menu_text".to_string(), Value::from(menu_text)),
            ("key_phrases".to_string(), json!(key_phrases)),
            ("raw_search".to_string(), Value::from(raw_search)),
        ])
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, StateSchema)]
pub struct GuideState {
    pub location: String,
    pub situation: String,
    /// Web query: menus, prices, tips for this exact place.
    pub specific_query: String,
    /// Video query: ordering guides for the brand or kind of place.
    pub general_query: String,
    pub web_results: String,
    pub video_context: String,
    pub guide: Guide,
}

impl GuideState {
    pub fn new(location: impl Into<String>, situation: impl Into<String>) -> GraphState<Self> {
        GraphState::new(Self {
            location: location.into(),
            situation: situation.into(),
            ..Default::default()
        })
    }

    /// Opens a trip-talk scene with this guide as its reference material.
    pub fn scene(&self) -> TripStateUpdate {
        scene(
            self.location.clone(),
            self.situation.clone(),
            self.guide.context_data(&self.web_results),
        )
    }
}

#[derive(Deserialize)]
struct Queries {
    specific_query: String,
    general_query: String,
}

struct Refine {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<GuideState> for Refine {
    async fn invoke_with_context(
        &self,
        input: GraphState<GuideState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<GuideState>, TroupeError> {
        let state = &input.data;
        let refined = match self
            .deps
            .generator
            .generate(prompts::guide_queries(&state.location, &state.situation))
            .await
        {
            Ok(reply) => OutputParser::<Queries>::parse(&JsonOutputParser, &reply),
            Err(error) => Err(error),
        };
        let queries = refined.unwrap_or_else(|error| {
            tracing::warn!(%error, "query refinement failed, using plain queries");
            Queries {
                specific_query: format!("{} {} menu price tips", state.location, state.situation),
                general_query: format!("{} ordering guide vlog", state.location),
            }
        });
        Ok(StateUpdate::new(
            GuideStateUpdate::default()
                .specific_query(queries.specific_query)
                .general_query(queries.general_query),
        ))
    }
}

struct WebSearch {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<GuideState> for WebSearch {
    async fn invoke_with_context(
        &self,
        input: GraphState<GuideState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<GuideState>, TroupeError> {
        let results = search_text(&self.deps, &input.data.specific_query, true).await;
        Ok(StateUpdate::new(GuideStateUpdate::default().web_results(results)))
    }
}

struct VideoSearch {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<GuideState> for VideoSearch {
    async fn invoke_with_context(
        &self,
        input: GraphState<GuideState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<GuideState>, TroupeError> {
        let query = format!("{} site:youtube.com", input.data.general_query);
        let mut context = search_text(&self.deps, &query, true).await;
        if context.trim().is_empty() {
            context = NO_VIDEO_CONTEXT.to_string();
        }
        Ok(StateUpdate::new(GuideStateUpdate::default().video_context(context)))
    }
}

struct Compose {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<GuideState> for Compose {
    async fn invoke_with_context(
        &self,
        input: GraphState<GuideState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<GuideState>, TroupeError> {
        let state = &input.data;
        let request = prompts::guide_compose(
            &state.location,
            &state.situation,
            &state.web_results,
            &state.video_context,
        );
        let parsed = match self.deps.generator.generate(request).await {
            Ok(reply) => OutputParser::<Guide>::parse(&JsonOutputParser, &reply),
            Err(error) => Err(error),
        };
        let guide = match parsed {
            Ok(guide) if !guide.is_empty() => guide,
            Ok(_) => {
                tracing::warn!("guide came back empty, using the fallback guide");
                Guide::fallback()
            }
            Err(error) => {
                tracing::warn!(%error, "guide generation failed, using the fallback guide");
                Guide::fallback()
            }
        };
        Ok(StateUpdate::new(GuideStateUpdate::default().guide(guide)))
    }
}

/// `refine → (web_search ∥ video_search) → compose → END`.
pub fn guide_graph(deps: &PipelineDeps) -> Result<CompiledGraph<GuideState>, PipelineError> {
    let graph = GraphBuilder::new()
        .add_node("refine", Refine { deps: deps.clone() })
        .add_node("web_search", WebSearch { deps: deps.clone() })
        .add_node("video_search", VideoSearch { deps: deps.clone() })
        .add_node("compose", Compose { deps: deps.clone() })
        .set_entry("refine")
        .add_edge("refine", "web_search")
        .add_edge("refine", "video_search")
        .add_edge("web_search", "compose")
        .add_edge("video_search", "compose")
        .add_edge("compose", END)
        .compile()?;
    Ok(graph)
}
