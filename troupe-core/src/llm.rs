use serde::{Deserialize, Serialize};

use crate::TroupeError;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct GenerationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Text-generation collaborator. The concrete inference call lives outside
/// this workspace; implementations are injected into node executors.
#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync + 'static {
    async fn generate(&self, request: GenerationRequest) -> Result<String, TroupeError>;
}
