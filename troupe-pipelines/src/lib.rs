//! Agent pipelines assembled from troupe graphs.
//!
//! The document pipeline is a supervisor over four teams, each its own
//! compiled sub-graph:
//!
//! - research: search, judge coverage, search again, summarise
//! - code and design: draft an artifact, review it, revise until it passes
//! - writer: draft the document from everything gathered, score it, redraft
//!
//! Trip-talk is a separate conversational graph that routes each message to
//! an in-scene character or a tutor. Its scene material comes from the guide
//! graph, which fans out to a web and a video search.
//!
//! Collaborators (text generation, search, artifact storage) arrive through
//! [`PipelineDeps`]; bounds and thresholds through [`PipelineConfig`].

mod config;
mod deps;
mod error;
pub mod guide;
mod message;
pub mod prompts;
pub mod research;
pub mod review;
pub mod supervisor;
pub mod trip_talk;
pub mod writer;

pub use config::PipelineConfig;
pub use deps::PipelineDeps;
pub use error::PipelineError;
pub use guide::{guide_graph, Guide, GuideState};
pub use message::{transcript, ChatMessage, Role};
pub use research::{research_graph, ResearchState};
pub use review::{code_graph, design_graph, review_graph, ArtifactKind, ReviewState};
pub use supervisor::{
    main_graph, main_graph_builder, request, GeneratorPolicy, MainState, StatusView,
    SupervisorPolicy,
};
pub use trip_talk::{trip_talk_graph, Persona, TripState};
pub use writer::{writer_graph, WriterState};
