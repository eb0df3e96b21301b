use std::sync::Arc;

use troupe_core::{ArtifactSink, FileArtifactSink, NullArtifactSink, SearchClient, TextGenerator};

use crate::PipelineConfig;

/// Collaborators handed to every node at graph construction.
#[derive(Clone)]
pub struct PipelineDeps {
    pub generator: Arc<dyn TextGenerator>,
    /// Without a search client, research degrades to a fixed notice.
    pub search: Option<Arc<dyn SearchClient>>,
    pub artifacts: Arc<dyn ArtifactSink>,
}

impl PipelineDeps {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            search: None,
            artifacts: Arc::new(NullArtifactSink),
        }
    }

    pub fn with_search(mut self, search: Arc<dyn SearchClient>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_artifacts(mut self, artifacts: Arc<dyn ArtifactSink>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Writes artifacts under `config.artifact_dir` when one is set.
    pub fn with_config_artifacts(self, config: &PipelineConfig) -> Self {
        match &config.artifact_dir {
            Some(dir) => self.with_artifacts(Arc::new(FileArtifactSink::new(dir))),
            None => self,
        }
    }

    /// Records a step artifact. Unlabelled runs and sink failures are
    /// skipped; artifacts never fail a node.
    pub(crate) async fn record(&self, run_label: &str, step: &str, result: serde_json::Value) {
        if run_label.is_empty() {
            return;
        }
        if let Err(error) = self.artifacts.record(run_label, step, result).await {
            tracing::warn!(%error, run_label, step, "failed to record step artifact");
        }
    }
}
