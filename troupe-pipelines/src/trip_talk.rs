//! Trip-talk: a conversational practice graph. A router sends each user
//! message either to an in-scene character (the clerk) or to a tutor.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use troupe_core::{
    Checkpointer, GraphState, JsonOutputParser, OutputParser, StateSchema, StateUpdate,
    TroupeError,
};
use troupe_graph::{CompiledGraph, GraphBuilder, GraphContext, GraphNode, END};

use crate::message::{transcript, ChatMessage};
use crate::{prompts, PipelineDeps, PipelineError};

const DEFAULT_LOCATION: &str = "General";
const DEFAULT_SITUATION: &str = "General";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Clerk,
    #[default]
    Tutor,
}

impl Persona {
    pub fn node(self) -> &'static str {
        match self {
            Persona::Clerk => "clerk",
            Persona::Tutor => "tutor",
        }
    }

    /// Reads a router reply. JSON `{"target": ...}` is preferred; otherwise
    /// the reply is scanned for a persona name. Anything else goes to the
    /// tutor.
    pub fn classify(reply: &str) -> Self {
        #[derive(Deserialize)]
        struct Route {
            target: String,
        }

        let target = OutputParser::<Route>::parse(&JsonOutputParser, reply)
            .map(|route| route.target)
            .unwrap_or_else(|_| reply.to_string())
            .to_lowercase();
        if target.contains("clerk") {
            Persona::Clerk
        } else {
            Persona::Tutor
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, StateSchema)]
pub struct TripState {
    #[reducer(append)]
    pub messages: Vec<ChatMessage>,
    /// Scene material: `menu_text`, `key_phrases`, `guide`.
    #[reducer(merge)]
    pub context_data: BTreeMap<String, Value>,
    pub persona: Persona,
    pub location: String,
    pub situation: String,
}

impl TripState {
    fn location(&self) -> &str {
        non_empty(&self.location, DEFAULT_LOCATION)
    }

    fn situation(&self) -> &str {
        non_empty(&self.situation, DEFAULT_SITUATION)
    }

    fn scene_context(&self) -> String {
        let text = |key: &str| match self.context_data.get(key) {
            Some(Value::String(text)) => text.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        let flow = self
            .context_data
            .get("guide")
            .and_then(|guide| guide.get("conversation_flow"))
            .map(Value::to_string)
            .unwrap_or_default();
        format!(
            "Menu / info:\n{}\n\nKey phrases:\n{}\n\nConversation flow:\n{flow}",
            text("menu_text"),
            text("key_phrases"),
        )
    }
}

fn non_empty<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

/// One user turn.
pub fn user_turn(text: impl Into<String>) -> StateUpdate<TripState> {
    StateUpdate::new(TripStateUpdate::default().messages(vec![ChatMessage::user(text)]))
}

/// Opens a scene: location, situation and its reference material.
pub fn scene(
    location: impl Into<String>,
    situation: impl Into<String>,
    context_data: BTreeMap<String, Value>,
) -> TripStateUpdate {
    TripStateUpdate::default()
        .location(location.into())
        .situation(situation.into())
        .context_data(context_data)
}

struct Router {
    deps: PipelineDeps,
}

#[async_trait::async_trait]
impl GraphNode<TripState> for Router {
    async fn invoke_with_context(
        &self,
        input: GraphState<TripState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<TripState>, TroupeError> {
        let state = &input.data;
        let last = state
            .messages
            .last()
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        let reply = self
            .deps
            .generator
            .generate(prompts::trip_router(state.location(), state.situation(), last))
            .await?;
        let persona = Persona::classify(&reply);
        tracing::debug!(?persona, "message routed");
        Ok(StateUpdate::new(TripStateUpdate::default().persona(persona)))
    }
}

struct Speaker {
    deps: PipelineDeps,
    persona: Persona,
}

#[async_trait::async_trait]
impl GraphNode<TripState> for Speaker {
    async fn invoke_with_context(
        &self,
        input: GraphState<TripState>,
        _context: &GraphContext,
    ) -> Result<StateUpdate<TripState>, TroupeError> {
        let state = &input.data;
        let context = state.scene_context();
        let history = transcript(&state.messages);
        let request = match self.persona {
            Persona::Clerk => {
                prompts::clerk(state.location(), state.situation(), &context, &history)
            }
            Persona::Tutor => prompts::tutor(&context, &history),
        };
        let reply = self.deps.generator.generate(request).await?;
        Ok(StateUpdate::new(
            TripStateUpdate::default()
                .messages(vec![ChatMessage::assistant(self.persona.node(), reply)]),
        ))
    }
}

/// `router → (clerk | tutor) → END`. Conversations continue per thread
/// through the checkpointer.
pub fn trip_talk_graph<C>(
    deps: &PipelineDeps,
    checkpointer: C,
) -> Result<CompiledGraph<TripState>, PipelineError>
where
    C: Checkpointer<TripState> + 'static,
{
    let clerk = Persona::Clerk.node();
    let tutor = Persona::Tutor.node();
    let graph = GraphBuilder::new()
        .add_node("router", Router { deps: deps.clone() })
        .add_node(
            clerk,
            Speaker {
                deps: deps.clone(),
                persona: Persona::Clerk,
            },
        )
        .add_node(
            tutor,
            Speaker {
                deps: deps.clone(),
                persona: Persona::Tutor,
            },
        )
        .set_entry("router")
        .add_conditional_edge(
            "router",
            |state: &GraphState<TripState>| state.data.persona.node(),
            [clerk, tutor],
        )
        .add_edge(clerk, END)
        .add_edge(tutor, END)
        .with_checkpointer(checkpointer)
        .compile()?;
    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_prefers_json_then_keywords() {
        assert_eq!(Persona::classify(r#"{"target": "clerk"}"#), Persona::Clerk);
        assert_eq!(Persona::classify(r#"{"target": "tutor"}"#), Persona::Tutor);
        assert_eq!(Persona::classify("Route to CLERK please"), Persona::Clerk);
        assert_eq!(Persona::classify(r#"{"target": "waiter"}"#), Persona::Tutor);
        assert_eq!(Persona::classify(""), Persona::Tutor);
    }

    #[test]
    fn scene_context_reads_guide_flow() {
        let state = TripState {
            context_data: [
                ("menu_text".to_string(), Value::from("coffee 3€")),
                (
                    "guide".to_string(),
                    serde_json::json!({ "conversation_flow": ["greet", "order"] }),
                ),
            ]
            .into(),
            ..Default::default()
        };
        let context = state.scene_context();
        assert!(context.contains("coffee 3€"));
        assert!(context.contains(r#"["greet","order"]"#));
        assert_eq!(state.location(), "General");
    }
}
