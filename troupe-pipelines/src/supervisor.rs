//! The main graph: a supervisor dispatching research, code, design and
//! writer teams until a final document exists.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use troupe_core::{
    Decision, DecisionParser, GraphState, OutputParser, StateSchema, StateUpdate, TextGenerator,
    TroupeError,
};
use troupe_graph::{
    CompiledGraph, GraphBuilder, GraphContext, Subgraph, SupervisorNode, SupervisorOutput,
    SupervisorRoutes,
};

use crate::message::{ChatMessage, Role};
use crate::research::{research_graph, ResearchState};
use crate::review::{code_graph, design_graph, ReviewState};
use crate::writer::{writer_graph, WriterState};
use crate::{prompts, PipelineConfig, PipelineDeps, PipelineError};

pub const SUPERVISOR_NODE: &str = "supervisor";
pub const RESEARCH_NODE: &str = "research_subgraph";
pub const CODE_NODE: &str = "code_subgraph";
pub const DESIGN_NODE: &str = "designer_subgraph";
pub const WRITER_NODE: &str = "writer_subgraph";

pub const RESEARCH_KEY: &str = "research";
pub const CODE_KEY: &str = "code";
pub const DESIGN_KEY: &str = "design";
pub const FINAL_DOC_KEY: &str = "final_doc";

/// Producer node and the `agent_results` key it fills.
pub const PRODUCERS: [(&str, &str); 4] = [
    (RESEARCH_NODE, RESEARCH_KEY),
    (CODE_NODE, CODE_KEY),
    (DESIGN_NODE, DESIGN_KEY),
    (WRITER_NODE, FINAL_DOC_KEY),
];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, StateSchema)]
pub struct MainState {
    #[reducer(append)]
    pub messages: Vec<ChatMessage>,
    #[reducer(merge)]
    pub agent_results: BTreeMap<String, String>,
    /// Targets of the latest supervisor decision, before guards.
    pub next: Vec<String>,
    pub run_label: String,
}

impl MainState {
    /// The request that started the run: the first user message.
    pub fn topic(&self) -> &str {
        self.messages
            .iter()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.as_str())
            .unwrap_or_default()
    }

    fn result(&self, key: &str) -> String {
        self.agent_results.get(key).cloned().unwrap_or_default()
    }
}

/// Input of a new document request.
pub fn request(text: impl Into<String>, run_label: impl Into<String>) -> StateUpdate<MainState> {
    StateUpdate::new(
        MainStateUpdate::default()
            .messages(vec![ChatMessage::user(text)])
            .run_label(run_label.into()),
    )
}

/// Which artifacts exist, as shown to the policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
    pub research: bool,
    pub code: bool,
    pub design: bool,
    pub final_doc: bool,
}

impl StatusView {
    pub fn of(results: &BTreeMap<String, String>) -> Self {
        Self {
            research: results.contains_key(RESEARCH_KEY),
            code: results.contains_key(CODE_KEY),
            design: results.contains_key(DESIGN_KEY),
            final_doc: results.contains_key(FINAL_DOC_KEY),
        }
    }

    /// `{"research": "present", "code": "missing", ...}`
    pub fn describe(&self) -> String {
        let label = |present: bool| if present { "present" } else { "missing" };
        serde_json::json!({
            RESEARCH_KEY: label(self.research),
            CODE_KEY: label(self.code),
            DESIGN_KEY: label(self.design),
            FINAL_DOC_KEY: label(self.final_doc),
        })
        .to_string()
    }
}

/// Picks the next teams. The engine still applies `FINISH` dominance and
/// the producer guards to whatever comes back.
#[async_trait::async_trait]
pub trait SupervisorPolicy: Send + Sync + 'static {
    async fn decide(&self, request: &str, status: &StatusView) -> Result<Decision, TroupeError>;
}

/// Asks a text generator for a JSON decision. A reply that does not parse
/// fails the supervisor node.
pub struct GeneratorPolicy {
    generator: Arc<dyn TextGenerator>,
}

impl GeneratorPolicy {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait::async_trait]
impl SupervisorPolicy for GeneratorPolicy {
    async fn decide(&self, request: &str, status: &StatusView) -> Result<Decision, TroupeError> {
        let reply = self
            .generator
            .generate(prompts::supervisor(request, &status.describe()))
            .await?;
        DecisionParser.parse(&reply)
    }
}

struct Supervisor {
    policy: Arc<dyn SupervisorPolicy>,
}

#[async_trait::async_trait]
impl SupervisorNode<MainState> for Supervisor {
    async fn decide(
        &self,
        input: GraphState<MainState>,
        _context: &GraphContext,
    ) -> Result<SupervisorOutput<MainState>, TroupeError> {
        let state = &input.data;
        let last = state
            .messages
            .last()
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        let status = StatusView::of(&state.agent_results);
        tracing::info!(?status, "supervisor deciding");
        let decision = self.policy.decide(last, &status).await?;
        tracing::info!(
            targets = ?decision.targets,
            rationale = %decision.rationale,
            "supervisor decided"
        );
        let update = MainStateUpdate::default().next(decision.targets.clone());
        Ok(SupervisorOutput::new(decision).with_update(StateUpdate::new(update)))
    }
}

fn store(key: &str, value: &str) -> StateUpdate<MainState> {
    StateUpdate::new(
        MainStateUpdate::default().agent_results([(key.to_string(), value.to_string())].into()),
    )
}

/// The main graph, not yet compiled, so callers can attach a checkpointer
/// or execution defaults.
pub fn main_graph_builder(
    deps: &PipelineDeps,
    config: &PipelineConfig,
    policy: Arc<dyn SupervisorPolicy>,
) -> Result<GraphBuilder<MainState>, PipelineError> {
    let research = Subgraph::new(
        "research",
        research_graph(deps, config)?,
        |parent: &MainState| ResearchState {
            topic: parent.topic().to_string(),
            run_label: parent.run_label.clone(),
            ..Default::default()
        },
        |child: &ResearchState| store(RESEARCH_KEY, &child.raw_data),
    );
    let code = Subgraph::new(
        "code",
        code_graph(deps, config)?,
        |parent: &MainState| ReviewState {
            topic: parent.topic().to_string(),
            run_label: parent.run_label.clone(),
            ..Default::default()
        },
        |child: &ReviewState| store(CODE_KEY, &child.artifact),
    );
    let design = Subgraph::new(
        "design",
        design_graph(deps, config)?,
        |parent: &MainState| ReviewState {
            topic: parent.topic().to_string(),
            run_label: parent.run_label.clone(),
            ..Default::default()
        },
        |child: &ReviewState| store(DESIGN_KEY, &child.artifact),
    );
    let writer = Subgraph::new(
        "writer",
        writer_graph(deps, config)?,
        |parent: &MainState| WriterState {
            topic: parent.topic().to_string(),
            research_data: parent.result(RESEARCH_KEY),
            code_data: parent.result(CODE_KEY),
            design_data: parent.result(DESIGN_KEY),
            run_label: parent.run_label.clone(),
            ..Default::default()
        },
        |child: &WriterState| store(FINAL_DOC_KEY, &child.draft),
    );

    let mut builder = GraphBuilder::new()
        .add_supervisor(
            SUPERVISOR_NODE,
            Supervisor { policy },
            SupervisorRoutes::new([RESEARCH_NODE, CODE_NODE, DESIGN_NODE, WRITER_NODE])
                .with_fallback(WRITER_NODE),
        )
        .add_node(RESEARCH_NODE, research)
        .add_node(CODE_NODE, code)
        .add_node(DESIGN_NODE, design)
        .add_node(WRITER_NODE, writer)
        .set_entry(SUPERVISOR_NODE);
    for (node, key) in PRODUCERS {
        builder = builder
            .add_edge(node, SUPERVISOR_NODE)
            .add_guard(node, move |state: &MainState| {
                state.agent_results.contains_key(key)
            });
    }
    Ok(builder)
}

pub fn main_graph(
    deps: &PipelineDeps,
    config: &PipelineConfig,
    policy: Arc<dyn SupervisorPolicy>,
) -> Result<CompiledGraph<MainState>, PipelineError> {
    Ok(main_graph_builder(deps, config, policy)?.compile()?)
}
