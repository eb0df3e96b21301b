use serde::{Deserialize, Serialize};

/// Reserved decision target meaning "the run is complete".
pub const FINISH: &str = "FINISH";

/// Routing decision emitted by a supervisor node.
///
/// `rationale` is diagnostic only; the engine never reads it for control flow.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Decision {
    #[serde(rename = "next", alias = "targets", default)]
    pub targets: Vec<String>,
    #[serde(rename = "reasoning", alias = "rationale", default)]
    pub rationale: String,
}

impl Decision {
    pub fn new<I, T>(targets: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            targets: targets.into_iter().map(Into::into).collect(),
            rationale: String::new(),
        }
    }

    pub fn finish() -> Self {
        Self::new([FINISH])
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// `FINISH` dominates every other listed target.
    pub fn is_finish(&self) -> bool {
        self.targets.iter().any(|target| target == FINISH)
    }
}
