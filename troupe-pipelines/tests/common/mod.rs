#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use troupe_core::{GenerationRequest, SearchClient, SearchHit, TextGenerator, TroupeError};

/// Answers generator calls from scripted replies keyed by a marker found in
/// the system or user prompt. The first matching rule wins; its last reply
/// repeats once the queue is down to one.
#[derive(Default)]
pub struct ScriptedGenerator {
    rules: Mutex<Vec<(String, VecDeque<String>)>>,
    calls: Mutex<Vec<(String, GenerationRequest)>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on<I, T>(self: &Arc<Self>, marker: &str, replies: I) -> Arc<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.rules.lock().unwrap().push((
            marker.to_string(),
            replies.into_iter().map(Into::into).collect(),
        ));
        self.clone()
    }

    pub fn count(&self, marker: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(matched, _)| matched == marker)
            .count()
    }

    pub fn prompts(&self, marker: &str) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(matched, _)| matched == marker)
            .map(|(_, request)| request.prompt.clone())
            .collect()
    }
}

#[async_trait::async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, TroupeError> {
        let system = request.system.clone().unwrap_or_default();
        let mut rules = self.rules.lock().unwrap();
        let matches = |marker: &str| system.contains(marker) || request.prompt.contains(marker);
        let Some((marker, replies)) = rules.iter_mut().find(|(marker, _)| matches(marker)) else {
            return Err(TroupeError::collaborator("generator", "no scripted reply"));
        };
        let reply = if replies.len() > 1 {
            replies.pop_front().unwrap_or_default()
        } else {
            replies.front().cloned().unwrap_or_default()
        };
        self.calls.lock().unwrap().push((marker.clone(), request));
        Ok(reply)
    }
}

/// Returns one hit per query, echoing it, and remembers the queries.
#[derive(Default)]
pub struct EchoSearch {
    pub fail: bool,
    queries: Mutex<Vec<String>>,
}

impl EchoSearch {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SearchClient for EchoSearch {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, TroupeError> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            return Err(TroupeError::collaborator("search", "quota exhausted"));
        }
        Ok(vec![SearchHit::new(format!("facts about {query}"))])
    }
}

// Markers matching the system prompts of each pipeline step.
pub const RESEARCH_JUDGE: &str = "strict research lead";
pub const RESEARCH_QUERY: &str = "seasoned researcher";
pub const RESEARCH_SUMMARY: &str = "Summarise the key points";
pub const WRITER_DRAFT: &str = "senior editor";
pub const WRITER_REVIEW: &str = "demanding chief editor";
pub const CODE_DRAFT: &str = "senior Python developer";
pub const DESIGN_DRAFT: &str = "systems architect";
pub const DESIGN_REVIEW: &str = "[Mermaid diagram]";
pub const CODE_REVIEW: &str = "[code]";
pub const REVISE: &str = "Apply the reviewer's feedback";
pub const SUPERVISOR: &str = "project manager";
pub const TRIP_ROUTER: &str = "route messages";
pub const CLERK: &str = "member of staff";
pub const TUTOR: &str = "helpful language tutor";
pub const GUIDE_QUERIES: &str = "search query optimizer";
pub const GUIDE_COMPOSE: &str = "expert travel guide writer";
