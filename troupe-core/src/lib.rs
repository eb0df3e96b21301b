mod artifact;
pub mod checkpoint;
mod decision;
mod error;
mod llm;
pub mod output_parsers;
mod search;
pub mod state;

pub use artifact::{ArtifactSink, FileArtifactSink, NullArtifactSink, StepRecord};
pub use checkpoint::{
    Checkpoint, CheckpointMetadata, Checkpointer, HistoryCheckpointer, InMemoryCheckpointer,
};
pub use decision::{Decision, FINISH};
pub use error::TroupeError;
pub use llm::{GenerationRequest, TextGenerator};
pub use output_parsers::{
    DecisionParser, JsonOutputParser, KeywordVerdictParser, OutputParser, ScoreFeedbackParser,
    ScoredReview, StatusLineParser, StatusReview, Verdict, WithFallback,
};
pub use search::{SearchClient, SearchHit};
pub use state::{
    Append, FieldSpec, GraphState, Reducer, ReducerKind, Replace, ShallowMerge, StateSchema,
    StateUpdate, Union,
};

#[cfg(feature = "derive")]
pub use troupe_macros::StateSchema;
